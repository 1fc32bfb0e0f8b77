use crate::CoreError;

/// Floating point type used throughout the simulator
pub type Real = f64;

/// Absolute/relative tolerance pair for the adaptive step controller
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-3,
            rel: 1e-3,
        }
    }
}

/// Standard CNN output nonlinearity: y(x) = clamp(x, -1, 1).
#[inline]
pub fn saturate(v: Real) -> Real {
    v.clamp(-1.0, 1.0)
}

pub fn nearly_equal(a: Real, b: Real, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    if diff <= tol.abs {
        return true;
    }
    diff <= tol.rel * a.abs().max(b.abs())
}

pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, CoreError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CoreError::NonFinite { what, value: v })
    }
}
