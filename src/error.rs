use thiserror::Error;

/// Failures of the capture source. Acquisition failures end the session.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("camera permission denied")]
    PermissionDenied,

    #[error("no camera device available")]
    NoDevice,

    #[error("capture device lost: {0}")]
    DeviceLost(String),

    #[error("capture not supported: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

/// Errors that cross the orchestrator boundary. Decode misses, decoder
/// failures and decode timeouts are never reported through this type.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to start capture: {0}")]
    Capture(#[from] CaptureError),

    #[error("a scan session is already active")]
    SessionActive,

    #[error("no scan session is active")]
    NoSession,

    #[error("no symbol found after {attempts} attempt(s)")]
    NoSymbolFound { attempts: usize },

    #[error("invalid image: {0}")]
    InvalidImage(String),
}

impl ScanError {
    /// Whether the error should be shown as a soft notice rather than a failure.
    pub fn is_user_notice(&self) -> bool {
        matches!(self, ScanError::NoSymbolFound { .. })
    }
}
