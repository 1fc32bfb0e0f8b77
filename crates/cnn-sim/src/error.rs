//! Error types for simulation operations.

use thiserror::Error;

/// Errors encountered while constructing or running a simulation.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Buffer size mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Adaptive step failed at t={t}: {what}")]
    StepFailed { t: f64, what: &'static str },
}

pub type SimResult<T> = Result<T, SimError>;

impl From<cnn_core::CoreError> for SimError {
    fn from(e: cnn_core::CoreError) -> Self {
        match e {
            cnn_core::CoreError::SizeMismatch {
                what,
                expected,
                actual,
            } => SimError::DimensionMismatch {
                what,
                expected,
                actual,
            },
            _ => SimError::InvalidArg {
                what: "invalid core input",
            },
        }
    }
}
