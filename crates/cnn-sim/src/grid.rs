//! Rectangular cell-grid shape and flat indexing.

use crate::error::{SimError, SimResult};

/// Immutable grid dimensions; all state vectors are row-major flat buffers
/// of `dimension()` cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridShape {
    width: usize,
    height: usize,
}

impl GridShape {
    pub fn new(width: usize, height: usize) -> SimResult<Self> {
        if width == 0 || height == 0 {
            return Err(SimError::InvalidArg {
                what: "grid dimensions must be positive",
            });
        }
        Ok(Self { width, height })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn dimension(&self) -> usize {
        self.width * self.height
    }

    /// Row-major flat index.
    #[inline]
    pub fn idx(&self, r: usize, c: usize) -> usize {
        r * self.width + c
    }

    /// Signed-coordinate membership test.
    #[inline]
    pub fn contains(&self, r: isize, c: isize) -> bool {
        r >= 0 && c >= 0 && (r as usize) < self.height && (c as usize) < self.width
    }

    /// True when the whole `(2*radius + 1)²` window around `(r, c)` stays
    /// inside the grid, so sampling needs no boundary resolution.
    #[inline]
    pub fn is_interior(&self, r: usize, c: usize, radius: usize) -> bool {
        r >= radius && c >= radius && r + radius < self.height && c + radius < self.width
    }
}
