//! Shared fakes for the integration tests: a camera whose frame the test
//! swaps at will, decoders that read payloads out of pixels, and a sink that
//! records what it was given.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use image::{DynamicImage, GrayImage, Luma, Rgba, RgbaImage};
use qrscan_lib::capture::{CaptureConstraints, CaptureSource, StreamInfo};
use qrscan_lib::{AcceptedResult, CaptureError, DecodeHints, Decoder, RasterFrame, SymbolFormat, SymbolResult};

/// A frame whose top-left red channel carries a payload code; 0 means blank.
pub fn coded_frame(code: u8) -> RasterFrame {
    RasterFrame::new(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
        8,
        8,
        Rgba([code, 0, 0, 255]),
    )))
}

pub fn payload_for(code: u8) -> String {
    format!("P{code}")
}

/// Reads the payload code written by [`coded_frame`].
pub struct PixelDecoder {
    pub delay: Duration,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub calls: AtomicUsize,
}

impl PixelDecoder {
    pub fn new() -> Arc<Self> {
        Self::slow(Duration::ZERO)
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        })
    }
}

impl Decoder for PixelDecoder {
    fn name(&self) -> &str {
        "pixel"
    }

    fn decode(&self, frame: &RasterFrame, _hints: &DecodeHints) -> Result<Vec<SymbolResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let code = frame.image().to_rgba8().get_pixel(0, 0).0[0];

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if code == 0 {
            return Ok(Vec::new());
        }
        Ok(vec![SymbolResult::new(payload_for(code), SymbolFormat::Qr)])
    }
}

/// Only finds a symbol in grayscale images, standing in for a washed-out
/// photo that needs contrast enhancement.
pub struct GrayOnlyDecoder {
    pub calls: AtomicUsize,
}

impl Decoder for GrayOnlyDecoder {
    fn name(&self) -> &str {
        "gray-only"
    }

    fn decode(&self, frame: &RasterFrame, _hints: &DecodeHints) -> Result<Vec<SymbolResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match frame.image() {
            DynamicImage::ImageLuma8(_) => Ok(vec![SymbolResult::new("washed-out", SymbolFormat::Qr)]),
            _ => Ok(Vec::new()),
        }
    }
}

/// Camera whose current frame is controlled by the test through [`CameraHandle`].
pub struct FakeCamera {
    handle: CameraHandle,
    refuse_start: bool,
}

#[derive(Clone, Default)]
pub struct CameraHandle {
    frame: Arc<Mutex<Option<RasterFrame>>>,
    failing: Arc<AtomicBool>,
    panicking: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    stops: Arc<AtomicUsize>,
    last_device: Arc<Mutex<Option<String>>>,
}

impl CameraHandle {
    pub fn show(&self, frame: RasterFrame) {
        *self.frame.lock().unwrap() = Some(frame);
    }

    pub fn fail_frames(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn panic_on_frames(&self) {
        self.panicking.store(true, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn last_device(&self) -> Option<String> {
        self.last_device.lock().unwrap().clone()
    }
}

impl FakeCamera {
    pub fn new() -> (Self, CameraHandle) {
        let handle = CameraHandle::default();
        (
            Self {
                handle: handle.clone(),
                refuse_start: false,
            },
            handle,
        )
    }

    pub fn denied() -> Self {
        Self {
            handle: CameraHandle::default(),
            refuse_start: true,
        }
    }
}

impl CaptureSource for FakeCamera {
    fn start(&mut self, constraints: &CaptureConstraints) -> Result<StreamInfo, CaptureError> {
        if self.refuse_start {
            return Err(CaptureError::PermissionDenied);
        }
        *self.handle.last_device.lock().unwrap() = constraints.device_id.clone();
        self.handle.running.store(true, Ordering::SeqCst);
        Ok(StreamInfo {
            width: 8,
            height: 8,
            device_id: constraints.device_id.clone(),
        })
    }

    fn current_frame(&mut self) -> Result<Option<RasterFrame>, CaptureError> {
        if self.handle.panicking.load(Ordering::SeqCst) {
            panic!("camera driver crashed");
        }
        if self.handle.failing.load(Ordering::SeqCst) {
            return Err(CaptureError::DeviceLost("camera unplugged".into()));
        }
        Ok(self.handle.frame.lock().unwrap().clone())
    }

    fn stop(&mut self) {
        self.handle.running.store(false, Ordering::SeqCst);
        self.handle.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Records accepted payloads in arrival order.
#[derive(Clone, Default)]
pub struct RecordingSink {
    received: Arc<Mutex<Vec<String>>>,
}

impl RecordingSink {
    pub fn payloads(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }
}

impl qrscan_lib::ResultSink for RecordingSink {
    fn on_accepted(&self, result: &AcceptedResult) {
        self.received.lock().unwrap().push(result.payload.clone());
    }
}

/// Polls `check` until it holds or `limit` passes.
pub async fn wait_until(limit: Duration, check: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

/// Renders `text` as a QR code, 6 px per module with a 4-module quiet zone.
pub fn render_qr(text: &str) -> GrayImage {
    const SCALE: u32 = 6;
    const QUIET: u32 = 4;

    let code = qrcode::QrCode::new(text.as_bytes()).expect("payload fits in a QR code");
    let modules = code.width() as u32;
    let colors = code.to_colors();
    let side = (modules + 2 * QUIET) * SCALE;

    GrayImage::from_fn(side, side, |x, y| {
        let (mx, my) = (x / SCALE, y / SCALE);
        if mx < QUIET || my < QUIET || mx >= modules + QUIET || my >= modules + QUIET {
            return Luma([255]);
        }
        let index = ((my - QUIET) * modules + (mx - QUIET)) as usize;
        match colors[index] {
            qrcode::Color::Dark => Luma([0]),
            qrcode::Color::Light => Luma([255]),
        }
    })
}
