//! cnn-core: stable foundation for the CNN simulator.
//!
//! Contains:
//! - numeric (Real + tolerances + the saturating output nonlinearity)
//! - template (coupling matrices, boundary conditions, text codec)
//! - image (grayscale raster in [-1, 1] + 16-bit PNG codec)
//! - error (shared error types)

pub mod error;
pub mod image;
pub mod numeric;
pub mod template;

// Re-exports: nice ergonomics for downstream crates
pub use error::{CoreError, CoreResult};
pub use image::GrayscaleImage;
pub use numeric::*;
pub use template::{BoundaryCondition, CouplingMatrix, Template};
