use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::ScanOrigin;

/// One decode attempt: a live frame, or one rung of the still-image ladder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptMetrics {
    pub timestamp: DateTime<Utc>,
    pub origin: ScanOrigin,
    pub decoders: Vec<String>,
    pub decode_ms: u64,
    pub candidates: usize,
    pub accepted: usize,
    pub suppressed_cooldown: usize,
    pub suppressed_duplicate: usize,
    pub failures: u32,
    pub timeouts: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub recent_attempts: Vec<AttemptMetrics>,
    pub tick_count: u64,
    pub dropped_tick_count: u64,
    pub attempt_count: u64,
    pub miss_count: u64,
    pub failure_count: u64,
    pub timeout_count: u64,
    pub accepted_count: u64,
    pub cooldown_count: u64,
    pub duplicate_count: u64,
}
