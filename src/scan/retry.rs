use image::{imageops::FilterType, DynamicImage};
use serde::{Deserialize, Serialize};

use crate::models::{frame::stretch_contrast, RasterFrame};

/// Smallest edge a downscaled retry may produce.
const MIN_SCALED_EDGE: u32 = 32;
/// Largest edge an upscaled retry may produce.
const MAX_SCALED_EDGE: u32 = 4096;

/// A deterministic conditioning step applied to an uploaded image before a retry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Transform {
    Identity,
    GrayscaleContrast,
    Rotate90,
    Rotate180,
    Rotate270,
    ScaleUp,
    ScaleDown,
}

impl Transform {
    pub const LADDER: [Transform; 7] = [
        Transform::Identity,
        Transform::GrayscaleContrast,
        Transform::Rotate90,
        Transform::Rotate180,
        Transform::Rotate270,
        Transform::ScaleUp,
        Transform::ScaleDown,
    ];

    pub fn apply(self, frame: &RasterFrame) -> RasterFrame {
        let image = frame.image();
        let transformed = match self {
            Transform::Identity => image.clone(),
            Transform::GrayscaleContrast => {
                let mut gray = image.to_luma8();
                stretch_contrast(&mut gray);
                DynamicImage::ImageLuma8(gray)
            }
            Transform::Rotate90 => image.rotate90(),
            Transform::Rotate180 => image.rotate180(),
            Transform::Rotate270 => image.rotate270(),
            Transform::ScaleUp => scale(image, 2.0),
            Transform::ScaleDown => scale(image, 0.5),
        };
        RasterFrame::new(transformed)
    }
}

/// Scales both edges by one factor so symbol modules stay square. The factor
/// is pulled back when the short edge would drop below `MIN_SCALED_EDGE` or
/// the long edge would pass `MAX_SCALED_EDGE`.
fn scale(image: &DynamicImage, factor: f32) -> DynamicImage {
    let (width, height) = (image.width(), image.height());
    let (short, long) = (width.min(height), width.max(height));
    if short == 0 {
        return image.clone();
    }

    let floor = MIN_SCALED_EDGE.min(short) as f32 / short as f32;
    let ceiling = MAX_SCALED_EDGE.max(long) as f32 / long as f32;
    let factor = factor.clamp(floor, ceiling);

    let target = |edge: u32| ((edge as f32 * factor).round() as u32).max(1);
    let (new_width, new_height) = (target(width), target(height));
    if (new_width, new_height) == (width, height) {
        return image.clone();
    }
    image.resize_exact(new_width, new_height, FilterType::Triangle)
}

/// Fixed, content-independent sequence of retry transforms with an attempt cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryLadder {
    steps: Vec<Transform>,
    max_attempts: usize,
}

impl Default for RetryLadder {
    fn default() -> Self {
        Self::new(Transform::LADDER.to_vec(), Transform::LADDER.len())
    }
}

impl RetryLadder {
    /// `max_attempts` is clamped to `1..=steps.len()`.
    pub fn new(steps: Vec<Transform>, max_attempts: usize) -> Self {
        let steps = if steps.is_empty() {
            vec![Transform::Identity]
        } else {
            steps
        };
        let max_attempts = max_attempts.clamp(1, steps.len());
        Self {
            steps,
            max_attempts,
        }
    }

    pub fn with_max_attempts(max_attempts: usize) -> Self {
        Self::new(Transform::LADDER.to_vec(), max_attempts)
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// The transforms that will be tried, in order.
    pub fn steps(&self) -> &[Transform] {
        &self.steps[..self.max_attempts]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn marked(width: u32, height: u32) -> RasterFrame {
        let mut img = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
        img.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        RasterFrame::new(DynamicImage::ImageRgba8(img))
    }

    #[test]
    fn rotations_move_the_marker() {
        let frame = marked(4, 2);

        let turned = Transform::Rotate180.apply(&frame).image().to_rgba8();
        assert_eq!(turned.get_pixel(3, 1), &Rgba([255, 0, 0, 255]));

        let quarter = Transform::Rotate90.apply(&frame);
        assert_eq!((quarter.width(), quarter.height()), (2, 4));
    }

    #[test]
    fn grayscale_contrast_yields_luma() {
        let out = Transform::GrayscaleContrast.apply(&marked(4, 4));
        assert!(matches!(out.image(), DynamicImage::ImageLuma8(_)));
    }

    #[test]
    fn scaling_respects_bounds() {
        let up = Transform::ScaleUp.apply(&marked(100, 50));
        assert_eq!((up.width(), up.height()), (200, 100));

        let tiny = Transform::ScaleDown.apply(&marked(20, 20));
        assert_eq!((tiny.width(), tiny.height()), (20, 20));
    }

    #[test]
    fn scaling_keeps_the_aspect_ratio_at_the_bounds() {
        // Half of 50 would undershoot the minimum edge; both edges stop at 0.64x.
        let down = Transform::ScaleDown.apply(&marked(100, 50));
        assert_eq!((down.width(), down.height()), (64, 32));

        let up = Transform::ScaleUp.apply(&marked(3000, 1000));
        assert_eq!(up.width(), 4096);
        assert!((1364..=1366).contains(&up.height()));

        let wide = Transform::ScaleDown.apply(&marked(400, 40));
        assert_eq!((wide.width(), wide.height()), (320, 32));
    }

    #[test]
    fn attempts_are_capped_to_the_ladder() {
        assert_eq!(RetryLadder::with_max_attempts(3).steps().len(), 3);
        assert_eq!(RetryLadder::with_max_attempts(50).max_attempts(), 7);
        assert_eq!(RetryLadder::with_max_attempts(0).max_attempts(), 1);
        assert_eq!(RetryLadder::new(Vec::new(), 4).steps(), &[Transform::Identity]);
    }
}
