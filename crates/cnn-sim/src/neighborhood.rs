//! Weighted stencil-window evaluation.

use cnn_core::{CouplingMatrix, Real};

/// Weighted sum over the `(2k + 1)²` window centered on `(r, c)`:
/// `sum(sample(r + off_r, c + off_c) * matrix[off_r][off_c])` with offsets
/// in `[-k, k]`.
///
/// `sample` supplies the value at a possibly out-of-grid position; callers
/// pick a direct flat-buffer lookup for interior cells (no boundary branch
/// in the hot loop) or a [`crate::boundary::resolve`] delegate near the
/// edge. Both strategies must agree on interior cells.
#[inline]
pub fn weighted_sum(
    r: isize,
    c: isize,
    matrix: &CouplingMatrix,
    mut sample: impl FnMut(isize, isize) -> Real,
) -> Real {
    let k = matrix.radius() as isize;
    let mut acc = 0.0;
    for off_r in -k..=k {
        for off_c in -k..=k {
            acc += sample(r + off_r, c + off_c) * matrix.weight(off_r, off_c);
        }
    }
    acc
}
