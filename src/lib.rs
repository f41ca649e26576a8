//! Birdfeeder - bird feeder presence detection and photo capture.
//!
//! Watches a feeder with a camera and, optionally, a load cell. A visit is
//! detected from debounced motion and weight signals, one photo is taken per
//! arrival subject to a cooldown, and photos are stored locally and
//! optionally uploaded.

#![warn(missing_docs)]

pub mod calibration;
pub mod cli;
pub mod config;
pub mod constants;
pub mod detection;
pub mod error;
pub mod pipeline;
pub mod sensors;
pub mod storage;
pub mod upload;

use clap::Parser;
use cli::{CalibrateArgs, Cli, Command, ConfigAction};
use config::{Config, config_file_path, load_config_file, save_config};
use pipeline::{Monitor, MonitorSettings};
use sensors::{ScaleBackend, StreamCamera};
use std::path::Path;
use std::time::Duration;
use storage::CaptureStore;
use tokio::sync::watch;
use tracing::{info, warn};
use upload::HttpUploader;

pub use error::{Error, Result};

/// Main entry point for the birdfeeder CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    let config_path = match cli.config {
        Some(path) => path,
        None => config_file_path()?,
    };

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let mut config = load_config_file(&config_path)?;
            cli.detection.apply(&mut config);
            run_monitor(&config)
        }
        Command::Config { action } => handle_config_command(action, &config_path),
        Command::Calibrate(args) => handle_calibrate_command(&args),
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    // HTTP client internals are only interesting at -vv and above.
    let filter_str = if quiet {
        "warn"
    } else {
        match verbose {
            0 => "info,hyper=warn,reqwest=warn",
            1 => "debug,hyper=info,hyper_util=info",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_str));

    fmt().with_env_filter(filter).init();
}

/// Watch the feeder until Ctrl+C.
fn run_monitor(config: &Config) -> Result<()> {
    // Configuration errors surface before any device is touched.
    let settings = MonitorSettings::from_config(config)?;

    let runtime = tokio::runtime::Runtime::new().map_err(|e| Error::Internal {
        message: format!("Failed to create async runtime: {e}"),
    })?;

    runtime.block_on(async {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        if let Err(e) = ctrlc::set_handler(move || {
            if shutdown_tx.send_replace(true) {
                // Second Ctrl+C: stop without waiting for the current tick.
                std::process::exit(130); // 128 + SIGINT(2)
            }
            info!("Shutting down after the current tick...");
        }) {
            warn!("Failed to install Ctrl+C handler: {e}");
        }

        let store = CaptureStore::new(
            config.capture.images_dir.clone(),
            config.upload.location.clone(),
        );
        store.prepare().await?;
        info!("Saving photos to {}", store.images_dir().display());

        let scale = if settings.mode.uses_weight() {
            Some(ScaleBackend::connect(&config.scale).await?)
        } else {
            None
        };
        let camera = StreamCamera::from_config(&config.camera)?;
        let uploader = if config.upload.enabled {
            Some(HttpUploader::start(&config.upload)?)
        } else {
            None
        };

        let mut monitor = Monitor::new(settings, camera, scale, uploader, store)?;
        let outcome = monitor.run(shutdown_rx).await;

        if let Some(uploader) = monitor.into_uploader() {
            let grace = Duration::from_secs(config.upload.drain_timeout_secs);
            uploader.drain(grace).await;
        }

        outcome.map(|_| ())
    })
}

#[allow(clippy::print_stdout)]
fn handle_config_command(action: ConfigAction, path: &Path) -> Result<()> {
    match action {
        ConfigAction::Init => {
            if path.exists() {
                println!("Configuration file already exists: {}", path.display());
            } else {
                save_config(&Config::default(), path)?;
                println!("Created configuration file: {}", path.display());
                println!("\nNext steps:");
                println!("  Edit [motion] and [scale] to choose how birds are detected");
                println!("  birdfeeder run");
            }
            Ok(())
        }
        ConfigAction::Show => {
            let config = load_config_file(path)?;
            let rendered = toml::to_string_pretty(&config)
                .map_err(|source| Error::ConfigSerialize { source })?;
            println!("# {}", path.display());
            println!("{rendered}");
            Ok(())
        }
        ConfigAction::Path => {
            println!("{}", path.display());
            Ok(())
        }
    }
}

#[allow(clippy::print_stdout)]
fn handle_calibrate_command(args: &CalibrateArgs) -> Result<()> {
    let tare = calibration::read_readings(&args.tare)?;
    let loaded = calibration::read_readings(&args.loaded)?;
    info!(
        "Calibrating from {} tare and {} loaded readings",
        tare.len(),
        loaded.len()
    );

    let report = calibration::calibrate(&tare, &loaded, args.known_weight)?;
    println!("{report}");
    Ok(())
}
