//! Grayscale raster in CNN intensity space and its PNG codec.
//!
//! Pixel intensities live in `[-1, 1]` with the classical CNN sign
//! convention: brighter pixels map toward -1 (`value = 1 - 2 * normalized`).

use std::path::Path;

use image::{ImageBuffer, Luma};

use crate::error::{CoreError, CoreResult};
use crate::numeric::{saturate, Real};

/// Flat row-major grayscale image with intensities in `[-1, 1]`.
///
/// The zero-sized image doubles as the "invalid image" sentinel returned by
/// [`GrayscaleImage::load_png`] on decode failure; check [`is_empty`]
/// before use.
///
/// [`is_empty`]: GrayscaleImage::is_empty
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GrayscaleImage {
    width: usize,
    height: usize,
    buf: Vec<Real>,
}

impl GrayscaleImage {
    pub fn new(width: usize, height: usize, buf: Vec<Real>) -> CoreResult<Self> {
        if buf.len() != width * height {
            return Err(CoreError::SizeMismatch {
                what: "image buffer",
                expected: width * height,
                actual: buf.len(),
            });
        }
        Ok(Self { width, height, buf })
    }

    /// Uniform image of the given intensity.
    pub fn filled(width: usize, height: usize, value: Real) -> Self {
        Self {
            width,
            height,
            buf: vec![value; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn clear(&mut self) {
        self.width = 0;
        self.height = 0;
        self.buf.clear();
    }

    pub fn buf(&self) -> &[Real] {
        &self.buf
    }

    pub fn buf_mut(&mut self) -> &mut [Real] {
        &mut self.buf
    }

    pub fn into_buf(self) -> Vec<Real> {
        self.buf
    }

    #[inline]
    pub fn get(&self, r: usize, c: usize) -> Real {
        self.buf[r * self.width + c]
    }

    /// Decode a PNG into intensity space. Any decode failure yields the
    /// empty image rather than an error; callers check `is_empty()`.
    pub fn load_png(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let dynamic = match image::open(path) {
            Ok(img) => img,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "PNG decode failed");
                return Self::default();
            }
        };

        let luma = dynamic.to_luma16();
        let width = luma.width() as usize;
        let height = luma.height() as usize;
        let buf = luma
            .into_raw()
            .into_iter()
            .map(|p| 1.0 - 2.0 * Real::from(p) / Real::from(u16::MAX))
            .collect();

        Self { width, height, buf }
    }

    /// Encode as a 16-bit grayscale PNG, saturating each intensity first.
    pub fn save_png(&self, path: impl AsRef<Path>) -> CoreResult<()> {
        let pixels: Vec<u16> = self
            .buf
            .iter()
            .map(|&v| ((1.0 - saturate(v)) / 2.0 * Real::from(u16::MAX)).round() as u16)
            .collect();

        let luma: ImageBuffer<Luma<u16>, Vec<u16>> =
            ImageBuffer::from_raw(self.width as u32, self.height as u32, pixels).ok_or(
                CoreError::SizeMismatch {
                    what: "image buffer",
                    expected: self.width * self.height,
                    actual: self.buf.len(),
                },
            )?;

        luma.save(path)
            .map_err(|e| CoreError::ImageEncode(e.to_string()))
    }
}
