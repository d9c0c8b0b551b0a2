//! Binary entrypoint for qrscan. All logic lives in the library crate.

use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use clap::{ArgAction, Parser};

#[derive(Debug, Parser)]
#[command(name = "qrscan", about = "Decode QR codes from images or a simulated camera stream")]
struct Cli {
    /// Path to a JSON settings file
    #[arg(short, long, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Serve this image as a live camera stream
    #[arg(long, value_name = "FILE")]
    watch: Option<PathBuf>,

    /// How long to run the live stream
    #[arg(long, value_name = "SECONDS", default_value_t = 3)]
    seconds: u64,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,

    /// Images to decode
    images: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    qrscan_lib::run(qrscan_lib::RunOptions {
        settings_path: cli.settings,
        images: cli.images,
        watch: cli.watch,
        watch_for: Duration::from_secs(cli.seconds),
        verbosity: cli.verbose,
    })
    .await
}
