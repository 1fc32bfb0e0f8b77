use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Buffer size mismatch for {what}: expected {expected}, got {actual}")]
    SizeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Coupling matrix side must be odd and >= 3, got {side}")]
    BadMatrixSide { side: usize },

    #[error("Section '{section}' holds {count} values, not an odd perfect square")]
    BadSectionShape { section: char, count: usize },

    #[error("Unknown template section '{token}'")]
    UnknownSection { token: String },

    #[error("Unknown boundary condition '{token}'")]
    UnknownBoundary { token: String },

    #[error("Malformed number '{token}' in section '{section}'")]
    BadNumber { section: char, token: String },

    #[error("Template is missing required section '{section}'")]
    MissingSection { section: char },

    #[error("Feedback and feed-forward matrices differ in size: {a_side} vs {b_side}")]
    MatrixSizeMismatch { a_side: usize, b_side: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Image encode failed: {0}")]
    ImageEncode(String),
}
