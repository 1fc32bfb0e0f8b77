//! Feed-forward precomputation and the cell dynamic equation.

use cnn_core::{saturate, Real, Template};

use crate::boundary;
use crate::grid::GridShape;
use crate::neighborhood::weighted_sum;

/// Compute the static feed-forward term for every cell:
/// `FF[i] = Z + sum(B * u-neighborhood of i)`.
///
/// Runs once per simulation, over the full grid including the edge rows
/// and columns, always through the boundary-aware sampling path (branch
/// cost is irrelevant off the hot loop). Deterministic: the same input and
/// template always yield the same vector.
pub fn feed_forward(input: &[Real], shape: GridShape, template: &Template) -> Vec<Real> {
    let b = template.b();
    let bc = template.boundary();
    let vc = template.virtual_cell();
    let z = template.z();

    let mut ff = vec![0.0; shape.dimension()];
    for r in 0..shape.height() {
        for c in 0..shape.width() {
            ff[shape.idx(r, c)] = z
                + weighted_sum(r as isize, c as isize, b, |rp, cp| {
                    boundary::resolve(input, shape, rp, cp, bc, vc)
                });
        }
    }
    ff
}

/// The CNN dynamic equation, one derivative per cell:
/// `dxdt[i] = FF[i] - x[i] + sum(A * y(x-neighborhood of i))`.
///
/// Invoked by the evolver many times per substep, so interior cells (whose
/// window cannot leave the grid) sample the flat buffer directly with no
/// boundary branch; only cells within the stencil radius of an edge go
/// through [`boundary::resolve`]. The two paths are numerically identical
/// where both apply. Never mutates `x` or `ff`.
pub fn dynamic_eq(
    x: &[Real],
    dxdt: &mut [Real],
    shape: GridShape,
    template: &Template,
    ff: &[Real],
) {
    let a = template.a();
    let radius = template.radius();
    let bc = template.boundary();
    let vc = template.virtual_cell();

    for r in 0..shape.height() {
        for c in 0..shape.width() {
            let i = shape.idx(r, c);
            let coupling = if shape.is_interior(r, c, radius) {
                weighted_sum(r as isize, c as isize, a, |rp, cp| {
                    saturate(x[shape.idx(rp as usize, cp as usize)])
                })
            } else {
                weighted_sum(r as isize, c as isize, a, |rp, cp| {
                    saturate(boundary::resolve(x, shape, rp, cp, bc, vc))
                })
            };
            dxdt[i] = ff[i] - x[i] + coupling;
        }
    }
}
