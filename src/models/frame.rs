use anyhow::{anyhow, Context, Result};
use image::{DynamicImage, GrayImage, RgbaImage};

/// Ranges narrower than this are stretched to the full 0..=255 span.
const LOW_CONTRAST_RANGE: u8 = 200;

/// An owned raster handed from a capture source to the decoders.
#[derive(Debug, Clone)]
pub struct RasterFrame {
    image: DynamicImage,
}

impl RasterFrame {
    pub fn new(image: DynamicImage) -> Self {
        Self { image }
    }

    /// Wraps a tightly packed RGBA buffer, as read back from a canvas or camera.
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        let actual = pixels.len();
        let buffer = RgbaImage::from_raw(width, height, pixels).ok_or_else(|| {
            anyhow!("rgba buffer holds {actual} bytes, {width}x{height} needs {expected}")
        })?;
        Ok(Self::new(DynamicImage::ImageRgba8(buffer)))
    }

    /// Decodes an encoded image (PNG, JPEG, ...) sniffing the format from its bytes.
    pub fn from_encoded(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes).context("failed to decode image bytes")?;
        Ok(Self::new(image))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_image(self) -> DynamicImage {
        self.image
    }

    pub fn to_luma(&self) -> GrayImage {
        self.image.to_luma8()
    }
}

impl From<DynamicImage> for RasterFrame {
    fn from(image: DynamicImage) -> Self {
        Self::new(image)
    }
}

/// Stretches a low-contrast luma image to the full brightness range in place.
/// Returns whether any pixel changed.
pub fn stretch_contrast(gray: &mut GrayImage) -> bool {
    let (mut min_luma, mut max_luma) = (u8::MAX, u8::MIN);
    for pixel in gray.pixels() {
        min_luma = min_luma.min(pixel.0[0]);
        max_luma = max_luma.max(pixel.0[0]);
    }

    let range = max_luma.saturating_sub(min_luma);
    if range == 0 || range >= LOW_CONTRAST_RANGE {
        return false;
    }

    let scale = 255.0 / range as f32;
    for pixel in gray.pixels_mut() {
        let stretched = (pixel.0[0] - min_luma) as f32 * scale;
        pixel.0[0] = stretched.round().min(255.0) as u8;
    }
    true
}
