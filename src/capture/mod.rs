pub mod constraints;
pub mod still;

use crate::{error::CaptureError, models::RasterFrame};

pub use constraints::{CameraDevice, CaptureConstraints, Facing, StreamInfo};
pub use still::StillImageSource;

/// A source of frames for one capture session.
///
/// The session owns its source exclusively: `start` is called once when the
/// session initializes, `current_frame` on every cadence tick, and `stop` when
/// the session ends for any reason.
pub trait CaptureSource: Send + 'static {
    /// Cameras the source can open. Sources without a choice return nothing.
    fn devices(&self) -> Vec<CameraDevice> {
        Vec::new()
    }

    fn start(&mut self, constraints: &CaptureConstraints) -> Result<StreamInfo, CaptureError>;

    /// The latest frame, or `None` while the stream is not producing yet.
    fn current_frame(&mut self) -> Result<Option<RasterFrame>, CaptureError>;

    fn stop(&mut self);
}

/// Lets a source handed back by `ScanController::stop_session` be restarted.
impl CaptureSource for Box<dyn CaptureSource> {
    fn devices(&self) -> Vec<CameraDevice> {
        (**self).devices()
    }

    fn start(&mut self, constraints: &CaptureConstraints) -> Result<StreamInfo, CaptureError> {
        (**self).start(constraints)
    }

    fn current_frame(&mut self) -> Result<Option<RasterFrame>, CaptureError> {
        (**self).current_frame()
    }

    fn stop(&mut self) {
        (**self).stop()
    }
}
