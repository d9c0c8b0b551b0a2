use std::{fmt, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

use super::{DecodeHints, Decoder, RqrrDecoder};
use crate::models::{RasterFrame, SymbolResult};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

/// Serializable name of a strategy, used by settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum StrategyKind {
    Single,
    #[default]
    PrimaryWithFallback,
    DualParallelMerge,
}

/// Which decoders run for one frame, and in what order.
#[derive(Clone)]
pub enum DecoderStrategy {
    Single(Arc<dyn Decoder>),
    /// `fallback` only runs when `primary` found nothing (or failed).
    PrimaryWithFallback {
        primary: Arc<dyn Decoder>,
        fallback: Arc<dyn Decoder>,
    },
    /// Both run concurrently; results are merged with `first`'s ahead.
    DualParallelMerge {
        first: Arc<dyn Decoder>,
        second: Arc<dyn Decoder>,
    },
}

impl fmt::Debug for DecoderStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecoderStrategy::Single(decoder) => write!(f, "Single({})", decoder.name()),
            DecoderStrategy::PrimaryWithFallback { primary, fallback } => write!(
                f,
                "PrimaryWithFallback({} -> {})",
                primary.name(),
                fallback.name()
            ),
            DecoderStrategy::DualParallelMerge { first, second } => {
                write!(f, "DualParallelMerge({} + {})", first.name(), second.name())
            }
        }
    }
}

/// Admits one strategy run at a time.
///
/// The claim for a run is held by every decoder worker it spawns, so it is
/// only released once all of them have returned, even those that already
/// timed out.
#[derive(Debug, Clone)]
pub struct DecodeSlot {
    permits: Arc<Semaphore>,
}

impl Default for DecodeSlot {
    fn default() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(1)),
        }
    }
}

impl DecodeSlot {
    /// `None` while a previous run still has workers on the blocking pool.
    pub fn try_claim(&self) -> Option<DecodeClaim> {
        Arc::clone(&self.permits)
            .try_acquire_owned()
            .ok()
            .map(|permit| DecodeClaim {
                _permit: Arc::new(permit),
            })
    }

    /// Waits for any straggling workers to finish.
    pub async fn claim(&self) -> Result<DecodeClaim, AcquireError> {
        let permit = Arc::clone(&self.permits).acquire_owned().await?;
        Ok(DecodeClaim {
            _permit: Arc::new(permit),
        })
    }

    pub fn is_free(&self) -> bool {
        self.permits.available_permits() > 0
    }
}

/// Proof of an admitted run; cloned into each decoder worker.
#[derive(Debug, Clone)]
pub struct DecodeClaim {
    _permit: Arc<OwnedSemaphorePermit>,
}

/// What one strategy run produced, including the misses it swallowed.
#[derive(Debug, Clone, Default)]
pub struct DecodeOutcome {
    pub symbols: Vec<SymbolResult>,
    pub decoders_tried: Vec<String>,
    pub failures: u32,
    pub timeouts: u32,
}

impl DecodeOutcome {
    pub fn is_miss(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Formats outside `hints` are dropped before duplicates are collapsed,
    /// so an unwanted format never shadows a wanted one with the same payload.
    fn absorb(&mut self, decoder: &str, invocation: Invocation, hints: &DecodeHints) {
        self.decoders_tried.push(decoder.to_string());
        match invocation {
            Invocation::Found(mut symbols) => {
                hints.retain_accepted(&mut symbols);
                for symbol in symbols {
                    if !self.symbols.iter().any(|seen| seen.payload == symbol.payload) {
                        self.symbols.push(symbol);
                    }
                }
            }
            Invocation::Failed(reason) => {
                self.failures += 1;
                log_warn!("decoder {decoder} failed, treating as miss: {reason}");
            }
            Invocation::TimedOut => {
                self.timeouts += 1;
                log_warn!("decoder {decoder} timed out, treating as miss");
            }
        }
    }
}

enum Invocation {
    Found(Vec<SymbolResult>),
    Failed(String),
    TimedOut,
}

impl DecoderStrategy {
    /// Builds a strategy from the built-in `rqrr` presets.
    pub fn from_kind(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::Single => DecoderStrategy::Single(Arc::new(RqrrDecoder::fast())),
            StrategyKind::PrimaryWithFallback => DecoderStrategy::PrimaryWithFallback {
                primary: Arc::new(RqrrDecoder::fast()),
                fallback: Arc::new(RqrrDecoder::thorough()),
            },
            StrategyKind::DualParallelMerge => DecoderStrategy::DualParallelMerge {
                first: Arc::new(RqrrDecoder::fast()),
                second: Arc::new(RqrrDecoder::thorough()),
            },
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            DecoderStrategy::Single(_) => StrategyKind::Single,
            DecoderStrategy::PrimaryWithFallback { .. } => StrategyKind::PrimaryWithFallback,
            DecoderStrategy::DualParallelMerge { .. } => StrategyKind::DualParallelMerge,
        }
    }

    /// Runs the decoders for one frame. Never fails: decoder errors, panics
    /// and timeouts are counted in the outcome and otherwise treated as misses.
    ///
    /// `claim` stays held until every worker spawned here has returned.
    pub async fn decode(
        &self,
        frame: Arc<RasterFrame>,
        hints: &DecodeHints,
        limit: Duration,
        claim: DecodeClaim,
    ) -> DecodeOutcome {
        let mut outcome = DecodeOutcome::default();

        match self {
            DecoderStrategy::Single(decoder) => {
                let invocation = invoke(decoder, &frame, hints, limit, &claim).await;
                outcome.absorb(decoder.name(), invocation, hints);
            }
            DecoderStrategy::PrimaryWithFallback { primary, fallback } => {
                let invocation = invoke(primary, &frame, hints, limit, &claim).await;
                outcome.absorb(primary.name(), invocation, hints);

                if outcome.is_miss() {
                    log_debug!("{} found nothing, falling back to {}", primary.name(), fallback.name());
                    let invocation = invoke(fallback, &frame, hints, limit, &claim).await;
                    outcome.absorb(fallback.name(), invocation, hints);
                }
            }
            DecoderStrategy::DualParallelMerge { first, second } => {
                let (a, b) = tokio::join!(
                    invoke(first, &frame, hints, limit, &claim),
                    invoke(second, &frame, hints, limit, &claim)
                );
                outcome.absorb(first.name(), a, hints);
                outcome.absorb(second.name(), b, hints);
            }
        }

        outcome
    }
}

async fn invoke(
    decoder: &Arc<dyn Decoder>,
    frame: &Arc<RasterFrame>,
    hints: &DecodeHints,
    limit: Duration,
    claim: &DecodeClaim,
) -> Invocation {
    let worker = {
        let decoder = Arc::clone(decoder);
        let frame = Arc::clone(frame);
        let hints = hints.clone();
        let claim = claim.clone();
        tokio::task::spawn_blocking(move || {
            let _claim = claim;
            decoder.decode(&frame, &hints)
        })
    };

    // A timed-out worker keeps running on the blocking pool, still holding the
    // claim; its result is dropped.
    match tokio::time::timeout(limit, worker).await {
        Ok(Ok(Ok(symbols))) => Invocation::Found(symbols),
        Ok(Ok(Err(err))) => Invocation::Failed(format!("{err:#}")),
        Ok(Err(join_err)) => Invocation::Failed(format!("decoder worker join failed: {join_err}")),
        Err(_) => Invocation::TimedOut,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SymbolFormat;
    use anyhow::{anyhow, Result};
    use image::{DynamicImage, RgbaImage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        name: &'static str,
        payloads: Vec<(&'static str, SymbolFormat)>,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn new(name: &'static str, payloads: &[&'static str]) -> Arc<Self> {
            Arc::new(Self {
                name,
                payloads: payloads.iter().map(|p| (*p, SymbolFormat::Qr)).collect(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl Decoder for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        fn decode(&self, _frame: &RasterFrame, _hints: &DecodeHints) -> Result<Vec<SymbolResult>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .payloads
                .iter()
                .map(|(payload, format)| SymbolResult::new(*payload, format.clone()))
                .collect())
        }
    }

    struct Failing;

    impl Decoder for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn decode(&self, _frame: &RasterFrame, _hints: &DecodeHints) -> Result<Vec<SymbolResult>> {
            Err(anyhow!("device lost"))
        }
    }

    struct Panicking;

    impl Decoder for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        fn decode(&self, _frame: &RasterFrame, _hints: &DecodeHints) -> Result<Vec<SymbolResult>> {
            panic!("decoder blew up");
        }
    }

    struct Sleepy(Duration);

    impl Decoder for Sleepy {
        fn name(&self) -> &str {
            "sleepy"
        }

        fn decode(&self, _frame: &RasterFrame, _hints: &DecodeHints) -> Result<Vec<SymbolResult>> {
            std::thread::sleep(self.0);
            Ok(vec![SymbolResult::new("late", SymbolFormat::Qr)])
        }
    }

    fn frame() -> Arc<RasterFrame> {
        Arc::new(RasterFrame::new(DynamicImage::ImageRgba8(RgbaImage::new(4, 4))))
    }

    const LIMIT: Duration = Duration::from_secs(2);

    fn claim() -> DecodeClaim {
        DecodeSlot::default().try_claim().unwrap()
    }

    fn payloads(outcome: &DecodeOutcome) -> Vec<&str> {
        outcome.symbols.iter().map(|s| s.payload.as_str()).collect()
    }

    #[tokio::test]
    async fn fallback_skipped_when_primary_finds_something() {
        let primary = Fixed::new("primary", &["A"]);
        let fallback = Fixed::new("fallback", &["B"]);
        let strategy = DecoderStrategy::PrimaryWithFallback {
            primary: primary.clone(),
            fallback: fallback.clone(),
        };

        let outcome = strategy.decode(frame(), &DecodeHints::default(), LIMIT, claim()).await;

        assert_eq!(payloads(&outcome), vec!["A"]);
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);
        assert_eq!(outcome.decoders_tried, vec!["primary"]);
    }

    #[tokio::test]
    async fn fallback_runs_after_primary_miss_or_failure() {
        let fallback = Fixed::new("fallback", &["B"]);
        let strategy = DecoderStrategy::PrimaryWithFallback {
            primary: Arc::new(Failing),
            fallback: fallback.clone(),
        };

        let outcome = strategy.decode(frame(), &DecodeHints::default(), LIMIT, claim()).await;

        assert_eq!(payloads(&outcome), vec!["B"]);
        assert_eq!(outcome.failures, 1);
        assert_eq!(outcome.decoders_tried, vec!["failing", "fallback"]);
    }

    #[tokio::test]
    async fn primary_hits_outside_hints_do_not_block_fallback() {
        let primary = Arc::new(Fixed {
            name: "primary",
            payloads: vec![("4006381333931", SymbolFormat::Ean13)],
            calls: AtomicUsize::new(0),
        });
        let fallback = Fixed::new("fallback", &["qr-text"]);
        let strategy = DecoderStrategy::PrimaryWithFallback {
            primary,
            fallback: fallback.clone(),
        };

        let outcome = strategy.decode(frame(), &DecodeHints::qr_only(), LIMIT, claim()).await;

        assert_eq!(payloads(&outcome), vec!["qr-text"]);
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dual_merge_keeps_order_and_collapses_duplicates() {
        let strategy = DecoderStrategy::DualParallelMerge {
            first: Fixed::new("first", &["A", "B"]),
            second: Fixed::new("second", &["B", "C"]),
        };

        let outcome = strategy.decode(frame(), &DecodeHints::default(), LIMIT, claim()).await;

        assert_eq!(payloads(&outcome), vec!["A", "B", "C"]);
        assert_eq!(outcome.decoders_tried.len(), 2);
    }

    #[tokio::test]
    async fn panicking_decoder_is_a_miss() {
        let strategy = DecoderStrategy::Single(Arc::new(Panicking));
        let outcome = strategy.decode(frame(), &DecodeHints::default(), LIMIT, claim()).await;
        assert!(outcome.is_miss());
        assert_eq!(outcome.failures, 1);
    }

    #[tokio::test]
    async fn slow_decoder_times_out_as_a_miss() {
        let strategy = DecoderStrategy::Single(Arc::new(Sleepy(Duration::from_millis(300))));
        let outcome = strategy
            .decode(frame(), &DecodeHints::default(), Duration::from_millis(20), claim())
            .await;
        assert!(outcome.is_miss());
        assert_eq!(outcome.timeouts, 1);
    }

    #[tokio::test]
    async fn timed_out_worker_keeps_the_slot_until_it_returns() {
        let slot = DecodeSlot::default();
        let strategy = DecoderStrategy::Single(Arc::new(Sleepy(Duration::from_millis(300))));

        let claim = slot.try_claim().unwrap();
        let outcome = strategy
            .decode(frame(), &DecodeHints::default(), Duration::from_millis(20), claim)
            .await;

        assert_eq!(outcome.timeouts, 1);
        assert!(!slot.is_free());
        assert!(slot.try_claim().is_none());

        // `claim` resolves once the sleeping worker lets go.
        let reclaimed = tokio::time::timeout(Duration::from_secs(2), slot.claim()).await;
        assert!(matches!(reclaimed, Ok(Ok(_))));
    }

    #[tokio::test]
    async fn slot_is_released_when_decoders_finish() {
        let slot = DecodeSlot::default();
        let strategy = DecoderStrategy::DualParallelMerge {
            first: Fixed::new("first", &["A"]),
            second: Arc::new(Panicking),
        };

        let claim = slot.try_claim().unwrap();
        strategy.decode(frame(), &DecodeHints::default(), LIMIT, claim).await;

        assert!(slot.is_free());
    }

    #[tokio::test]
    async fn dual_merge_filters_formats_before_collapsing_duplicates() {
        let first = Arc::new(Fixed {
            name: "first",
            payloads: vec![("X", SymbolFormat::Ean13)],
            calls: AtomicUsize::new(0),
        });
        let strategy = DecoderStrategy::DualParallelMerge {
            first,
            second: Fixed::new("second", &["X"]),
        };

        let outcome = strategy.decode(frame(), &DecodeHints::qr_only(), LIMIT, claim()).await;

        assert_eq!(payloads(&outcome), vec!["X"]);
        assert_eq!(outcome.symbols[0].format, SymbolFormat::Qr);
    }

    #[test]
    fn builtin_kinds_round_trip() {
        for kind in [
            StrategyKind::Single,
            StrategyKind::PrimaryWithFallback,
            StrategyKind::DualParallelMerge,
        ] {
            assert_eq!(DecoderStrategy::from_kind(kind).kind(), kind);
        }
    }
}
