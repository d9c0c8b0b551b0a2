pub mod hints;
pub mod rqrr_decoder;
pub mod strategy;

use anyhow::Result;

use crate::models::{RasterFrame, SymbolResult};

pub use hints::DecodeHints;
pub use rqrr_decoder::RqrrDecoder;
pub use strategy::{DecodeClaim, DecodeOutcome, DecodeSlot, DecoderStrategy, StrategyKind};

/// A black-box symbol decoder.
///
/// Implementations are synchronous and CPU bound; the orchestrator runs them
/// on the blocking pool under a timeout. An empty vec means "no symbol found".
/// Errors are downgraded to a miss by the caller, so returning `Err` is always
/// safe.
pub trait Decoder: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn decode(&self, frame: &RasterFrame, hints: &DecodeHints) -> Result<Vec<SymbolResult>>;
}
