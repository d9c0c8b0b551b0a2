use serde::{Deserialize, Serialize};

/// Lifecycle of one capture session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "state")]
pub enum ScanStatus {
    Idle,
    Initializing,
    Scanning,
    /// Terminal for the session; the user has to start a new one.
    Error { message: String },
    Stopped,
}

impl Default for ScanStatus {
    fn default() -> Self {
        ScanStatus::Idle
    }
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Idle => "Idle",
            ScanStatus::Initializing => "Initializing",
            ScanStatus::Scanning => "Scanning",
            ScanStatus::Error { .. } => "Error",
            ScanStatus::Stopped => "Stopped",
        }
    }

    /// Whether a new session may be started from this state.
    pub fn can_start(&self) -> bool {
        matches!(
            self,
            ScanStatus::Idle | ScanStatus::Error { .. } | ScanStatus::Stopped
        )
    }

    pub fn is_scanning(&self) -> bool {
        matches!(self, ScanStatus::Scanning)
    }
}
