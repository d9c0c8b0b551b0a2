mod types;

pub use types::{AttemptMetrics, MetricsSnapshot};

use std::sync::Arc;
use tokio::sync::Mutex;

const MAX_RECENT_ATTEMPTS: usize = 20;

/// Counters for the scan loop and decode attempts, shared between the
/// controller, the loop task and the orchestrator.
#[derive(Clone, Default)]
pub struct ScanMetrics {
    inner: Arc<Mutex<MetricsSnapshot>>,
}

impl ScanMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_tick(&self) {
        self.inner.lock().await.tick_count += 1;
    }

    /// A cadence tick that found a decode already in flight.
    pub async fn record_dropped_tick(&self) {
        let mut state = self.inner.lock().await;
        state.tick_count += 1;
        state.dropped_tick_count += 1;
    }

    pub async fn record_attempt(&self, attempt: AttemptMetrics) {
        let mut state = self.inner.lock().await;

        state.attempt_count += 1;
        if attempt.candidates == 0 {
            state.miss_count += 1;
        }
        state.failure_count += u64::from(attempt.failures);
        state.timeout_count += u64::from(attempt.timeouts);
        state.accepted_count += attempt.accepted as u64;
        state.cooldown_count += attempt.suppressed_cooldown as u64;
        state.duplicate_count += attempt.suppressed_duplicate as u64;

        state.recent_attempts.push(attempt);

        if state.recent_attempts.len() > MAX_RECENT_ATTEMPTS {
            state.recent_attempts.remove(0);
        }
    }

    pub async fn snapshot(&self) -> MetricsSnapshot {
        self.inner.lock().await.clone()
    }

    pub async fn reset(&self) {
        *self.inner.lock().await = MetricsSnapshot::default();
    }
}
