//! Minimal image types and the frame-source capability.
//!
//! Platform frame buffers stay behind [`ImageSource`]; the numeric code only
//! ever sees a decoded, row-major [`ImageView`] and the 8-bit grayscale image
//! derived from it.

use serde::{Deserialize, Serialize};

/// Pixel layout of an [`ImageView`] buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// 4 bytes per pixel, `B, G, R, A`.
    Bgra8,
    /// 1 byte per pixel.
    Gray8,
    /// 2 bytes per pixel, little-endian.
    Gray16,
}

impl PixelFormat {
    #[inline]
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgra8 => 4,
            PixelFormat::Gray8 => 1,
            PixelFormat::Gray16 => 2,
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ImageError {
    #[error("invalid image buffer length (expected {expected} bytes, got {got})")]
    InvalidBufferLength { expected: usize, got: usize },
    #[error("invalid image dimensions (width={width}, height={height})")]
    InvalidDimensions { width: usize, height: usize },
}

/// Borrowed, read-only frame in any supported [`PixelFormat`].
#[derive(Clone, Copy, Debug)]
pub struct ImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub format: PixelFormat,
    pub data: &'a [u8], // row-major, len = w*h*bpp
}

#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    #[inline]
    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }
}

impl<'a> ImageView<'a> {
    /// Wrap a raw buffer, checking its length against the dimensions.
    pub fn new(
        width: usize,
        height: usize,
        format: PixelFormat,
        data: &'a [u8],
    ) -> Result<Self, ImageError> {
        let view = Self {
            width,
            height,
            format,
            data,
        };
        view.check_len()?;
        Ok(view)
    }

    /// Byte length the dimensions call for, compared against `data`.
    fn check_len(&self) -> Result<(), ImageError> {
        let expected = self
            .width
            .checked_mul(self.height)
            .and_then(|n| n.checked_mul(self.format.bytes_per_pixel()))
            .ok_or(ImageError::InvalidDimensions {
                width: self.width,
                height: self.height,
            })?;
        if self.data.len() != expected {
            return Err(ImageError::InvalidBufferLength {
                expected,
                got: self.data.len(),
            });
        }
        Ok(())
    }

    /// Convert to an owned 8-bit grayscale image.
    pub fn to_gray(&self) -> Result<GrayImage, ImageError> {
        self.check_len()?;

        let data = match self.format {
            PixelFormat::Gray8 => self.data.to_vec(),
            // keep the high byte
            PixelFormat::Gray16 => self.data.chunks_exact(2).map(|px| px[1]).collect(),
            PixelFormat::Bgra8 => self.data.chunks_exact(4).map(bgra_to_luma).collect(),
        };

        Ok(GrayImage {
            width: self.width,
            height: self.height,
            data,
        })
    }
}

#[inline]
fn bgra_to_luma(px: &[u8]) -> u8 {
    let b = px[0] as f32;
    let g = px[1] as f32;
    let r = px[2] as f32;
    (0.299 * r + 0.587 * g + 0.114 * b).round().clamp(0.0, 255.0) as u8
}

/// Producer of camera frames (a capture pipeline, a file reader, a test fixture).
///
/// `None` means no frame is available right now.
pub trait ImageSource {
    fn frame(&self) -> Option<ImageView<'_>>;
}

impl ImageSource for GrayImage {
    fn frame(&self) -> Option<ImageView<'_>> {
        Some(ImageView {
            width: self.width,
            height: self.height,
            format: PixelFormat::Gray8,
            data: &self.data,
        })
    }
}
