use std::{any::Any, panic::AssertUnwindSafe, sync::Arc, time::Instant};

use futures::FutureExt;
use tokio::sync::{watch, Mutex};
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::orchestrator::ScanOrchestrator;
use crate::{
    capture::CaptureSource,
    error::CaptureError,
    metrics::ScanMetrics,
    models::{ScanOrigin, ScanStatus},
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info};

/// What one cadence tick ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tick {
    /// A decode was still in flight, possibly past its timeout, or an upload
    /// held the orchestrator.
    Busy,
    NotReady,
    Decoded { accepted: usize },
    /// The session was torn down while the decode ran; results were dropped.
    Discarded,
}

/// Everything the loop task needs besides its capture source.
pub(crate) struct LoopContext {
    pub orchestrator: Arc<Mutex<ScanOrchestrator>>,
    pub status_tx: Arc<watch::Sender<ScanStatus>>,
    pub metrics: ScanMetrics,
    pub cadence: Duration,
    pub session_id: String,
}

/// Samples the capture source on a fixed cadence and feeds the orchestrator
/// until cancelled or the source fails. A panic while scanning ends the
/// session the same way a capture error does. Returns the source, already
/// stopped, so the caller can restart it.
pub(crate) async fn scan_loop(
    ctx: LoopContext,
    mut source: Box<dyn CaptureSource>,
    cancel_token: CancellationToken,
) -> Box<dyn CaptureSource> {
    let mut ticker = tokio::time::interval(ctx.cadence);
    // Ticks that fire during a slow decode are skipped, never queued.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let scan = AssertUnwindSafe(perform_scan(&ctx, source.as_mut(), &cancel_token))
                    .catch_unwind()
                    .await;
                let scan = match scan {
                    Ok(scan) => scan,
                    Err(panic) => {
                        log_error!(
                            "scan loop for session {} panicked: {}",
                            ctx.session_id,
                            panic_message(panic.as_ref())
                        );
                        ctx.status_tx.send_replace(ScanStatus::Error {
                            message: "Scanning stopped unexpectedly. Please restart the scanner.".into(),
                        });
                        break;
                    }
                };
                match scan {
                    Ok(Tick::Decoded { accepted }) if accepted > 0 => {
                        log_debug!("session {}: {} new payload(s)", ctx.session_id, accepted);
                    }
                    Ok(Tick::Discarded) => {
                        log_debug!("session {} ended mid-decode, result discarded", ctx.session_id);
                    }
                    Ok(_) => {}
                    Err(err) => {
                        log_error!("capture failed for session {}: {err}", ctx.session_id);
                        ctx.status_tx.send_replace(ScanStatus::Error {
                            message: err.to_string(),
                        });
                        break;
                    }
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("scan loop for session {} shutting down", ctx.session_id);
                break;
            }
        }
    }

    source.stop();
    source
}

async fn perform_scan(
    ctx: &LoopContext,
    source: &mut dyn CaptureSource,
    cancel_token: &CancellationToken,
) -> Result<Tick, CaptureError> {
    if cancel_token.is_cancelled() {
        return Ok(Tick::Discarded);
    }

    let Ok(mut orchestrator) = ctx.orchestrator.try_lock() else {
        ctx.metrics.record_dropped_tick().await;
        return Ok(Tick::Busy);
    };
    let Some(claim) = orchestrator.try_claim_decode() else {
        ctx.metrics.record_dropped_tick().await;
        return Ok(Tick::Busy);
    };
    ctx.metrics.record_tick().await;

    let Some(frame) = source.current_frame()? else {
        return Ok(Tick::NotReady);
    };
    if frame.is_empty() {
        return Ok(Tick::NotReady);
    }

    let started = Instant::now();
    let outcome = orchestrator.decode(Arc::new(frame), claim).await;

    if cancel_token.is_cancelled() {
        return Ok(Tick::Discarded);
    }

    let accepted = orchestrator
        .complete_attempt(outcome, ScanOrigin::Camera, started)
        .await;
    Ok(Tick::Decoded {
        accepted: accepted.len(),
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}
