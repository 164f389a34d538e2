//! Decoded pixel buffers.

use image::{imageops, ImageFormat, Rgba, RgbaImage};

use matte_common::error::{MatteError, MatteResult};
use matte_model::geometry::Size;

/// An immutable RGBA8 image with non-zero dimensions.
///
/// Layers are shared as `Arc<Raster>`; dropping the last handle releases
/// the pixel buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pixels: RgbaImage,
}

impl Raster {
    /// Wrap an RGBA buffer, rejecting empty images.
    pub fn new(pixels: RgbaImage) -> MatteResult<Self> {
        if pixels.width() == 0 || pixels.height() == 0 {
            return Err(MatteError::render(format!(
                "Raster dimensions must be non-zero (got {}x{})",
                pixels.width(),
                pixels.height()
            )));
        }
        Ok(Self { pixels })
    }

    /// A raster of `size` filled with one color.
    pub fn filled(size: Size, color: Rgba<u8>) -> MatteResult<Self> {
        Self::new(RgbaImage::from_pixel(size.width, size.height, color))
    }

    /// Decode encoded image bytes, sniffing the format from magic bytes.
    pub fn decode(bytes: &[u8]) -> MatteResult<Self> {
        let decoded = image::load_from_memory(bytes)
            .map_err(|e| MatteError::decode(format!("Failed to decode image: {e}")))?;
        Self::new(decoded.to_rgba8()).map_err(|e| MatteError::decode(e.user_message()))
    }

    /// Decode encoded image bytes of a known format.
    pub fn decode_as(bytes: &[u8], format: ImageFormat) -> MatteResult<Self> {
        let decoded = image::load_from_memory_with_format(bytes, format).map_err(|e| {
            MatteError::decode(format!("Failed to decode {format:?} image: {e}"))
        })?;
        Self::new(decoded.to_rgba8()).map_err(|e| MatteError::decode(e.user_message()))
    }

    pub fn size(&self) -> Size {
        Size::new(self.pixels.width(), self.pixels.height())
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn into_pixels(self) -> RgbaImage {
        self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        *self.pixels.get_pixel(x, y)
    }

    /// Resize to exactly `size`, ignoring aspect ratio.
    ///
    /// Returns a plain copy when the size already matches.
    pub fn stretched(&self, size: Size) -> MatteResult<Raster> {
        if size.is_empty() {
            return Err(MatteError::render(format!(
                "Cannot stretch raster to empty size {size}"
            )));
        }
        if size == self.size() {
            return Ok(self.clone());
        }
        let resized = imageops::resize(
            &self.pixels,
            size.width,
            size.height,
            imageops::FilterType::Triangle,
        );
        Raster::new(resized)
    }
}
