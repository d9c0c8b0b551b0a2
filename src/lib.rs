pub mod capture;
pub mod decoding;
pub mod error;
pub mod metrics;
pub mod models;
pub mod scan;
pub mod settings;
mod utils;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use log::{error, info, warn};

pub use capture::{CaptureConstraints, CaptureSource, StillImageSource};
pub use decoding::{DecodeHints, Decoder, DecoderStrategy, RqrrDecoder};
pub use error::{CaptureError, ScanError};
pub use models::{AcceptedResult, RasterFrame, ScanStatus, SymbolFormat, SymbolResult};
pub use scan::{ChannelSink, ResultSink, ScanController, ScanOrchestrator};
pub use settings::{ScanSettings, SettingsStore};

/// Options for the `qrscan` binary.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub settings_path: Option<PathBuf>,
    /// Images to push through the still-image path, in order.
    pub images: Vec<PathBuf>,
    /// Image to serve as a live camera stream.
    pub watch: Option<PathBuf>,
    pub watch_for: Duration,
    pub verbosity: u8,
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    // RUST_LOG still wins for anything it names.
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

pub async fn run(options: RunOptions) -> Result<()> {
    init_logging(options.verbosity);

    info!("qrscan starting up...");

    let settings = match &options.settings_path {
        Some(path) => SettingsStore::new(path.clone())?.settings(),
        None => ScanSettings::default(),
    };

    let (sink, mut accepted_rx) = ChannelSink::new();
    let controller = ScanController::new(&settings, Arc::new(sink));

    let printer = tokio::spawn(async move {
        while let Some(result) = accepted_rx.recv().await {
            println!("{}\t{}", result.format.as_str(), result.payload);
        }
    });

    for path in &options.images {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read image {}", path.display()))?;

        match controller.upload_image(bytes).await {
            Ok(accepted) => info!("{}: {} new payload(s)", path.display(), accepted.len()),
            Err(err) if err.is_user_notice() => warn!("{}: {err}", path.display()),
            Err(err) => error!("{}: {err}", path.display()),
        }
    }

    if let Some(path) = &options.watch {
        let source = StillImageSource::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        controller.start_session(source).await?;

        tokio::select! {
            _ = tokio::time::sleep(options.watch_for) => {}
            _ = tokio::signal::ctrl_c() => info!("interrupted, stopping scan session"),
        }

        controller.stop_session().await;
    }

    let metrics = controller.metrics().await;
    info!(
        "{} attempt(s), {} accepted, {} dropped tick(s), {} timeout(s)",
        metrics.attempt_count, metrics.accepted_count, metrics.dropped_tick_count, metrics.timeout_count
    );

    // Dropping the controller drops the sink, which closes the printer's channel.
    drop(controller);
    printer.await.context("result printer task failed")?;

    Ok(())
}
