use std::sync::Arc;

use log::{error, info, warn};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use super::{
    loop_worker::{scan_loop, LoopContext},
    orchestrator::ScanOrchestrator,
    sink::ResultSink,
};
use crate::{
    capture::{CaptureConstraints, CaptureSource, StreamInfo},
    decoding::DecoderStrategy,
    error::{CaptureError, ScanError},
    metrics::{MetricsSnapshot, ScanMetrics},
    models::{AcceptedResult, RasterFrame, ScanStatus},
    settings::ScanSettings,
};

struct ActiveSession {
    handle: JoinHandle<Box<dyn CaptureSource>>,
    cancel_token: CancellationToken,
    stream: StreamInfo,
}

/// Owns the capture session lifecycle: starting and stopping the live loop,
/// routing still-image uploads, and exposing status and history.
///
/// Cloning is cheap; clones share the same session.
#[derive(Clone)]
pub struct ScanController {
    orchestrator: Arc<Mutex<ScanOrchestrator>>,
    active: Arc<Mutex<Option<ActiveSession>>>,
    status_tx: Arc<watch::Sender<ScanStatus>>,
    constraints: Arc<Mutex<CaptureConstraints>>,
    cadence: Duration,
    metrics: ScanMetrics,
}

impl ScanController {
    pub fn new(settings: &ScanSettings, sink: Arc<dyn ResultSink>) -> Self {
        let orchestrator = ScanOrchestrator::new(
            settings.orchestrator_config(),
            DecoderStrategy::from_kind(settings.strategy),
            sink,
        );
        Self::with_orchestrator(orchestrator, settings.cadence(), settings.constraints.clone())
    }

    /// Wraps a pre-built orchestrator, e.g. one using custom decoders.
    pub fn with_orchestrator(
        orchestrator: ScanOrchestrator,
        cadence: Duration,
        constraints: CaptureConstraints,
    ) -> Self {
        let metrics = ScanMetrics::new();
        let (status_tx, _) = watch::channel(ScanStatus::Idle);

        Self {
            orchestrator: Arc::new(Mutex::new(orchestrator.with_metrics(metrics.clone()))),
            active: Arc::new(Mutex::new(None)),
            status_tx: Arc::new(status_tx),
            constraints: Arc::new(Mutex::new(constraints)),
            cadence,
            metrics,
        }
    }

    pub fn status(&self) -> ScanStatus {
        self.status_tx.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ScanStatus> {
        self.status_tx.subscribe()
    }

    pub async fn constraints(&self) -> CaptureConstraints {
        self.constraints.lock().await.clone()
    }

    /// Acquires the capture source and starts the cadence-driven scan loop.
    ///
    /// Acquisition failures are reported here, once, and leave the controller
    /// in `Error`; nothing retries them.
    pub async fn start_session(
        &self,
        source: impl CaptureSource,
    ) -> Result<StreamInfo, ScanError> {
        self.start_boxed(Box::new(source)).await
    }

    async fn start_boxed(&self, source: Box<dyn CaptureSource>) -> Result<StreamInfo, ScanError> {
        let mut active = self.active.lock().await;

        if !self.status().can_start() {
            return Err(ScanError::SessionActive);
        }
        // A loop that ended on its own (capture error) still needs reaping.
        if let Some(stale) = active.take() {
            stale.cancel_token.cancel();
            if let Err(err) = stale.handle.await {
                warn!("previous scan loop ended abnormally: {err}");
            }
        }

        self.status_tx.send_replace(ScanStatus::Initializing);

        let constraints = self.constraints.lock().await.clone();
        let (source, started) = tokio::task::spawn_blocking(move || {
            let mut source = source;
            let started = source.start(&constraints);
            (source, started)
        })
        .await
        .map_err(|err| {
            ScanError::Capture(CaptureError::DeviceLost(format!("capture start worker failed: {err}")))
        })
        .inspect_err(|err| self.fail(err))?;

        let stream = match started {
            Ok(stream) => stream,
            Err(err) => {
                let err = ScanError::Capture(err);
                self.fail(&err);
                return Err(err);
            }
        };

        let session_id = {
            let mut orchestrator = self.orchestrator.lock().await;
            orchestrator.begin_session();
            orchestrator.session_id().to_string()
        };

        // Published before the loop runs so a failing first tick is not
        // overwritten by `Scanning`.
        self.status_tx.send_replace(ScanStatus::Scanning);

        let cancel_token = CancellationToken::new();
        let ctx = LoopContext {
            orchestrator: Arc::clone(&self.orchestrator),
            status_tx: Arc::clone(&self.status_tx),
            metrics: self.metrics.clone(),
            cadence: self.cadence,
            session_id: session_id.clone(),
        };
        let handle = tokio::spawn(scan_loop(ctx, source, cancel_token.clone()));

        info!(
            "scan session {} started at {}x{} every {}ms",
            session_id,
            stream.width,
            stream.height,
            self.cadence.as_millis()
        );

        *active = Some(ActiveSession {
            handle,
            cancel_token,
            stream: stream.clone(),
        });

        Ok(stream)
    }

    /// Cancels the loop, waits for it to release the capture source and
    /// discards the session state. Returns the stopped source, if any.
    pub async fn stop_session(&self) -> Option<Box<dyn CaptureSource>> {
        let session = self.active.lock().await.take()?;
        session.cancel_token.cancel();

        let source = match session.handle.await {
            Ok(source) => Some(source),
            Err(err) => {
                error!("scan loop task failed to join: {err}");
                None
            }
        };

        self.orchestrator.lock().await.begin_session();
        self.status_tx.send_replace(ScanStatus::Stopped);
        info!("scan session stopped");

        source
    }

    /// Restarts the live session on another camera. The new session starts
    /// with an empty scanned set.
    pub async fn switch_camera(&self, device_id: impl Into<String>) -> Result<StreamInfo, ScanError> {
        let source = self.stop_session().await.ok_or(ScanError::NoSession)?;
        self.constraints.lock().await.device_id = Some(device_id.into());
        self.start_boxed(source).await
    }

    pub async fn stream_info(&self) -> Option<StreamInfo> {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|session| session.stream.clone())
    }

    /// Decodes an uploaded, still-encoded image.
    pub async fn upload_image(&self, bytes: Vec<u8>) -> Result<Vec<AcceptedResult>, ScanError> {
        let frame = tokio::task::spawn_blocking(move || RasterFrame::from_encoded(&bytes))
            .await
            .map_err(|err| ScanError::InvalidImage(format!("image decode worker failed: {err}")))?
            .map_err(|err| ScanError::InvalidImage(format!("{err:#}")))?;
        self.upload_frame(frame).await
    }

    /// Runs the still-image retry ladder on a decoded image.
    ///
    /// While a live session is scanning, the upload shares its scanned set and
    /// holds the orchestrator for the whole ladder, so the live loop drops
    /// its ticks until the upload finishes. Without a live session each
    /// upload is its own session.
    pub async fn upload_frame(&self, frame: RasterFrame) -> Result<Vec<AcceptedResult>, ScanError> {
        let mut orchestrator = self.orchestrator.lock().await;
        if !self.status().is_scanning() {
            orchestrator.begin_session();
        }
        orchestrator.process_static_image(frame).await
    }

    pub async fn history(&self) -> Vec<AcceptedResult> {
        self.orchestrator.lock().await.history()
    }

    pub async fn clear_history(&self) {
        self.orchestrator.lock().await.clear_history();
    }

    pub async fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot().await
    }

    fn fail(&self, err: &ScanError) {
        error!("scan session failed to start: {err}");
        self.status_tx.send_replace(ScanStatus::Error {
            message: err.to_string(),
        });
    }
}
