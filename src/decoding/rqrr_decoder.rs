use anyhow::{bail, Result};
use image::{imageops::FilterType, GrayImage};

use super::{DecodeHints, Decoder};
use crate::models::{frame::stretch_contrast, Point, RasterFrame, SymbolFormat, SymbolResult};

const ENABLE_LOGS: bool = true;

use crate::log_debug;

/// Frames at least this wide also get a half-size pass in thorough mode.
const DOWNSCALE_MIN_WIDTH: u32 = 800;

/// QR decoder backed by `rqrr`, a pure Rust port of quirc.
#[derive(Debug, Clone)]
pub struct RqrrDecoder {
    name: &'static str,
    thorough: bool,
}

impl RqrrDecoder {
    /// Single pass over the luma image. Conditioning passes only run when
    /// the caller sets `try_harder`.
    pub fn fast() -> Self {
        Self {
            name: "rqrr-fast",
            thorough: false,
        }
    }

    /// Always follows a miss with contrast-stretched and downscaled passes.
    pub fn thorough() -> Self {
        Self {
            name: "rqrr-thorough",
            thorough: true,
        }
    }

    fn conditioned_variants(gray: &GrayImage) -> Vec<GrayImage> {
        let mut variants = Vec::with_capacity(2);

        let mut stretched = gray.clone();
        if stretch_contrast(&mut stretched) {
            variants.push(stretched);
        }

        if gray.width() >= DOWNSCALE_MIN_WIDTH {
            variants.push(image::imageops::resize(
                gray,
                gray.width() / 2,
                gray.height() / 2,
                FilterType::Triangle,
            ));
        }

        variants
    }
}

impl Decoder for RqrrDecoder {
    fn name(&self) -> &str {
        self.name
    }

    fn decode(&self, frame: &RasterFrame, hints: &DecodeHints) -> Result<Vec<SymbolResult>> {
        if frame.is_empty() {
            bail!("cannot decode an empty {}x{} frame", frame.width(), frame.height());
        }
        if !hints.accepts(&SymbolFormat::Qr) {
            return Ok(Vec::new());
        }

        let gray = frame.to_luma();
        let found = decode_luma(gray.clone());
        if !found.is_empty() || !(self.thorough || hints.try_harder) {
            return Ok(found);
        }

        for variant in Self::conditioned_variants(&gray) {
            let found = decode_luma(variant);
            if !found.is_empty() {
                return Ok(found);
            }
        }

        Ok(Vec::new())
    }
}

fn decode_luma(gray: GrayImage) -> Vec<SymbolResult> {
    let mut prepared = rqrr::PreparedImage::prepare(gray);
    let mut symbols: Vec<SymbolResult> = Vec::new();

    for grid in prepared.detect_grids() {
        match grid.decode() {
            Ok((_meta, content)) if !content.is_empty() => {
                if symbols.iter().any(|symbol| symbol.payload == content) {
                    continue;
                }
                let bounds = grid.bounds;
                let location = [
                    Point { x: bounds[0].x, y: bounds[0].y },
                    Point { x: bounds[1].x, y: bounds[1].y },
                    Point { x: bounds[2].x, y: bounds[2].y },
                    Point { x: bounds[3].x, y: bounds[3].y },
                ];
                symbols.push(SymbolResult::new(content, SymbolFormat::Qr).with_location(location));
            }
            Ok(_) => {}
            Err(err) => log_debug!("rqrr grid found but failed to decode: {err:?}"),
        }
    }

    symbols
}
