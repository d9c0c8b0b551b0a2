use std::path::Path;

use super::{CameraDevice, CaptureConstraints, CaptureSource, StreamInfo};
use crate::{error::CaptureError, models::RasterFrame};

const DEVICE_ID: &str = "still-image";

/// Serves a single image as if it were a live camera stream.
pub struct StillImageSource {
    frame: RasterFrame,
    label: String,
    running: bool,
}

impl StillImageSource {
    pub fn new(frame: RasterFrame, label: impl Into<String>) -> Self {
        Self {
            frame,
            label: label.into(),
            running: false,
        }
    }

    pub fn open(path: &Path) -> Result<Self, CaptureError> {
        let image = image::open(path)?;
        let label = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(RasterFrame::new(image), label))
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

impl CaptureSource for StillImageSource {
    fn devices(&self) -> Vec<CameraDevice> {
        vec![CameraDevice {
            device_id: DEVICE_ID.to_string(),
            label: self.label.clone(),
        }]
    }

    fn start(&mut self, constraints: &CaptureConstraints) -> Result<StreamInfo, CaptureError> {
        if let Some(requested) = constraints.device_id.as_deref() {
            if requested != DEVICE_ID {
                return Err(CaptureError::NoDevice);
            }
        }
        if self.frame.is_empty() {
            return Err(CaptureError::Unsupported("image has no pixels".into()));
        }

        self.running = true;
        Ok(StreamInfo {
            width: self.frame.width(),
            height: self.frame.height(),
            device_id: Some(DEVICE_ID.to_string()),
        })
    }

    fn current_frame(&mut self) -> Result<Option<RasterFrame>, CaptureError> {
        if !self.running {
            return Err(CaptureError::DeviceLost("stream is not running".into()));
        }
        Ok(Some(self.frame.clone()))
    }

    fn stop(&mut self) {
        self.running = false;
    }
}
