use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;

use super::{
    history::{HistoryOrder, RecentHistory, DEFAULT_HISTORY_LIMIT},
    retry::RetryLadder,
    sink::ResultSink,
    state::{SessionState, Verdict},
};
use crate::{
    decoding::{DecodeClaim, DecodeHints, DecodeOutcome, DecodeSlot, DecoderStrategy},
    error::ScanError,
    metrics::{AttemptMetrics, ScanMetrics},
    models::{AcceptedResult, RasterFrame, ScanOrigin, SymbolResult},
    utils::logging::debug_decodes_enabled,
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(2000);
pub const DEFAULT_DECODE_TIMEOUT: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub cooldown: Duration,
    pub decode_timeout: Duration,
    pub history_limit: usize,
    pub history_order: HistoryOrder,
    pub hints: DecodeHints,
    pub ladder: RetryLadder,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            cooldown: DEFAULT_COOLDOWN,
            decode_timeout: DEFAULT_DECODE_TIMEOUT,
            history_limit: DEFAULT_HISTORY_LIMIT,
            history_order: HistoryOrder::default(),
            hints: DecodeHints::default(),
            ladder: RetryLadder::default(),
        }
    }
}

/// How the candidates of one attempt were judged.
#[derive(Debug, Default)]
struct Tally {
    accepted: Vec<AcceptedResult>,
    cooldown: usize,
    duplicate: usize,
}

/// Decides which decoded symbols are new and forwards them to the sink.
///
/// Owns the session state and recent history outright; nothing outside the
/// orchestrator mutates them. Callers that share it across tasks wrap it in
/// an async mutex. The decode slot keeps a single decode in flight, counting
/// workers that outlived their timeout.
pub struct ScanOrchestrator {
    config: OrchestratorConfig,
    strategy: DecoderStrategy,
    decode_slot: DecodeSlot,
    session: SessionState,
    history: RecentHistory,
    sink: Arc<dyn ResultSink>,
    metrics: ScanMetrics,
    trace_decodes: bool,
}

impl ScanOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        strategy: DecoderStrategy,
        sink: Arc<dyn ResultSink>,
    ) -> Self {
        Self {
            session: SessionState::new(config.cooldown),
            history: RecentHistory::new(config.history_limit, config.history_order),
            config,
            strategy,
            decode_slot: DecodeSlot::default(),
            sink,
            metrics: ScanMetrics::new(),
            trace_decodes: debug_decodes_enabled(),
        }
    }

    pub fn with_metrics(mut self, metrics: ScanMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn strategy(&self) -> &DecoderStrategy {
        &self.strategy
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn session_id(&self) -> &str {
        self.session.session_id()
    }

    /// Drops the scanned set and cooldown and starts a fresh session.
    /// Recent history is kept.
    pub fn begin_session(&mut self) {
        self.session = SessionState::new(self.config.cooldown);
        log_debug!("orchestrator session {} started", self.session.session_id());
    }

    /// Clears history and the scanned set. The cooldown survives.
    pub fn clear_history(&mut self) {
        self.history.clear();
        self.session.clear_scanned();
    }

    pub fn history(&self) -> Vec<AcceptedResult> {
        self.history.entries()
    }

    /// Decodes one live frame and forwards every new payload.
    pub async fn process_frame(&mut self, frame: RasterFrame) -> Vec<AcceptedResult> {
        let claim = match self.decode_slot.claim().await {
            Ok(claim) => claim,
            Err(err) => {
                log_error!("decode slot unavailable, skipping frame: {err}");
                return Vec::new();
            }
        };
        let started = Instant::now();
        let outcome = self.decode(Arc::new(frame), claim).await;
        self.complete_attempt(outcome, ScanOrigin::Camera, started).await
    }

    /// Runs the retry ladder over an uploaded image, stopping at the first
    /// transform that yields any symbol.
    ///
    /// Returns `Ok` with an empty vec when symbols were found but all of them
    /// were suppressed as repeats.
    pub async fn process_static_image(
        &mut self,
        frame: RasterFrame,
    ) -> Result<Vec<AcceptedResult>, ScanError> {
        if frame.is_empty() {
            return Err(ScanError::InvalidImage("image has no pixels".into()));
        }

        let original = Arc::new(frame);
        let steps = self.config.ladder.steps().to_vec();
        let mut attempts = 0;

        for step in steps {
            attempts += 1;
            let started = Instant::now();

            let conditioned = {
                let original = Arc::clone(&original);
                match tokio::task::spawn_blocking(move || step.apply(&original)).await {
                    Ok(conditioned) => conditioned,
                    Err(err) => {
                        log_warn!("transform {step:?} failed, skipping: {err}");
                        continue;
                    }
                }
            };

            // A rung waits for any worker a timed-out rung left behind.
            let claim = match self.decode_slot.claim().await {
                Ok(claim) => claim,
                Err(err) => {
                    log_error!("decode slot unavailable, abandoning still image: {err}");
                    break;
                }
            };
            let outcome = self.decode(Arc::new(conditioned), claim).await;
            if outcome.is_miss() {
                self.complete_attempt(outcome, ScanOrigin::Image, started).await;
                continue;
            }

            log_info!("still image decoded on attempt {attempts} ({step:?})");
            return Ok(self.complete_attempt(outcome, ScanOrigin::Image, started).await);
        }

        log_info!("still image: no symbol after {attempts} attempt(s)");
        Err(ScanError::NoSymbolFound { attempts })
    }

    /// Claims the decode slot without waiting. `None` while an earlier
    /// decode, timed out or not, still has workers running.
    pub(crate) fn try_claim_decode(&self) -> Option<DecodeClaim> {
        self.decode_slot.try_claim()
    }

    /// Runs the decoder strategy without touching session state.
    pub(crate) async fn decode(&self, frame: Arc<RasterFrame>, claim: DecodeClaim) -> DecodeOutcome {
        self.strategy
            .decode(frame, &self.config.hints, self.config.decode_timeout, claim)
            .await
    }

    /// Applies the accept policy to a finished decode and records metrics.
    pub(crate) async fn complete_attempt(
        &mut self,
        outcome: DecodeOutcome,
        origin: ScanOrigin,
        started: Instant,
    ) -> Vec<AcceptedResult> {
        let decode_ms = started.elapsed().as_millis() as u64;
        let candidates = outcome.symbols.len();
        let tally = self.accept(outcome.symbols, origin, Instant::now());

        if self.trace_decodes {
            log::debug!(
                "{:?} attempt via {:?}: {} candidate(s), {} accepted, {}ms",
                origin,
                outcome.decoders_tried,
                candidates,
                tally.accepted.len(),
                decode_ms
            );
        }

        self.metrics
            .record_attempt(AttemptMetrics {
                timestamp: Utc::now(),
                origin,
                decoders: outcome.decoders_tried,
                decode_ms,
                candidates,
                accepted: tally.accepted.len(),
                suppressed_cooldown: tally.cooldown,
                suppressed_duplicate: tally.duplicate,
                failures: outcome.failures,
                timeouts: outcome.timeouts,
            })
            .await;

        tally.accepted
    }

    /// Candidates are judged in decoder order, so a payload repeated within
    /// one frame is accepted once.
    fn accept(&mut self, candidates: Vec<SymbolResult>, origin: ScanOrigin, now: Instant) -> Tally {
        let mut tally = Tally::default();

        for symbol in candidates {
            match self.session.evaluate(&symbol.payload, now) {
                Verdict::CoolingDown => tally.cooldown += 1,
                Verdict::Duplicate => tally.duplicate += 1,
                Verdict::Accept => {
                    self.session.record_accept(&symbol.payload, now);
                    let result =
                        AcceptedResult::from_symbol(symbol, origin, self.session.session_id());
                    log_info!(
                        "accepted {} payload ({} chars) in session {}",
                        result.format.as_str(),
                        result.payload.chars().count(),
                        result.session_id
                    );
                    self.history.push(result.clone());
                    self.sink.on_accepted(&result);
                    tally.accepted.push(result);
                }
            }
        }

        tally
    }
}
