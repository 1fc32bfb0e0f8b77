//! Boundary-condition-aware sample resolution.
//!
//! When a cell's stencil window crosses the grid edge, out-of-range
//! positions are resolved by the template's boundary policy. Clamping and
//! wrapping are correct for any offset magnitude, not just one ring past
//! the edge (stencil radii > 1 step several cells out).

use cnn_core::{BoundaryCondition, Real};

use crate::grid::GridShape;

/// Resolve a possibly out-of-grid `(r, c)` lookup into `buf`.
///
/// In-range positions take the fast path with no policy dispatch. Pure and
/// total: every position resolves to a value under all three policies.
#[inline]
pub fn resolve(
    buf: &[Real],
    shape: GridShape,
    r: isize,
    c: isize,
    boundary: BoundaryCondition,
    virtual_cell: Real,
) -> Real {
    if shape.contains(r, c) {
        return buf[shape.idx(r as usize, c as usize)];
    }

    match boundary {
        BoundaryCondition::Constant => virtual_cell,
        BoundaryCondition::ZeroFlux => {
            let r = r.clamp(0, shape.height() as isize - 1) as usize;
            let c = c.clamp(0, shape.width() as isize - 1) as usize;
            buf[shape.idx(r, c)]
        }
        BoundaryCondition::Periodic => {
            let r = r.rem_euclid(shape.height() as isize) as usize;
            let c = c.rem_euclid(shape.width() as isize) as usize;
            buf[shape.idx(r, c)]
        }
    }
}
