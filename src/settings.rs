use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use crate::{
    capture::CaptureConstraints,
    decoding::{DecodeHints, StrategyKind},
    scan::{
        history::{HistoryOrder, DEFAULT_HISTORY_LIMIT},
        retry::{RetryLadder, Transform},
        OrchestratorConfig,
    },
};

const MIN_CADENCE_MS: u64 = 33;
const MAX_CADENCE_MS: u64 = 800;
const MAX_COOLDOWN_MS: u64 = 10_000;
const MIN_DECODE_TIMEOUT_MS: u64 = 100;
const MAX_DECODE_TIMEOUT_MS: u64 = 10_000;

/// User-tunable scan behaviour. Out-of-range values are clamped when read,
/// not rejected, so a hand-edited file never prevents scanning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ScanSettings {
    pub cadence_ms: u64,
    pub cooldown_ms: u64,
    pub decode_timeout_ms: u64,
    pub history_limit: usize,
    pub history_order: HistoryOrder,
    pub max_static_attempts: usize,
    pub strategy: StrategyKind,
    pub hints: DecodeHints,
    pub constraints: CaptureConstraints,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            cadence_ms: 250,
            cooldown_ms: 2000,
            decode_timeout_ms: 1500,
            history_limit: DEFAULT_HISTORY_LIMIT,
            history_order: HistoryOrder::NewestFirst,
            max_static_attempts: Transform::LADDER.len(),
            strategy: StrategyKind::PrimaryWithFallback,
            hints: DecodeHints::qr_only(),
            constraints: CaptureConstraints::default(),
        }
    }
}

impl ScanSettings {
    pub fn cadence(&self) -> Duration {
        Duration::from_millis(self.cadence_ms.clamp(MIN_CADENCE_MS, MAX_CADENCE_MS))
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms.min(MAX_COOLDOWN_MS))
    }

    pub fn decode_timeout(&self) -> Duration {
        Duration::from_millis(
            self.decode_timeout_ms
                .clamp(MIN_DECODE_TIMEOUT_MS, MAX_DECODE_TIMEOUT_MS),
        )
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            cooldown: self.cooldown(),
            decode_timeout: self.decode_timeout(),
            history_limit: self.history_limit,
            history_order: self.history_order,
            hints: self.hints.clone(),
            ladder: RetryLadder::with_max_attempts(self.max_static_attempts),
        }
    }
}

/// JSON-file backed settings. A missing or unreadable file yields defaults.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<ScanSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!("ignoring malformed settings in {}: {err}", path.display());
                ScanSettings::default()
            })
        } else {
            ScanSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn settings(&self) -> ScanSettings {
        self.read().clone()
    }

    pub fn update(&self, settings: ScanSettings) -> Result<()> {
        let mut guard = self.write();
        *guard = settings;
        self.persist(&guard)
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data: ScanSettings = serde_json::from_str(&contents)
            .with_context(|| format!("Malformed settings in {}", self.path.display()))?;
        *self.write() = data;
        Ok(())
    }

    fn persist(&self, data: &ScanSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, ScanSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, ScanSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
