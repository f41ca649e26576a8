//! CLI argument definitions.

use super::validators::{parse_seconds, parse_threshold};
use crate::config::{Config, ScaleBackendKind, ScoreMode};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Bird feeder presence detection and photo capture.
#[derive(Debug, Parser)]
#[command(name = "birdfeeder")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run (default: run).
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Configuration file (default: platform config directory).
    #[arg(long, global = true, env = "BIRDFEEDER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Only log warnings and errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase verbosity (-v: debug, -vv: trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Overrides for the detection settings.
    #[command(flatten)]
    pub detection: DetectionArgs,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Watch the feeder until interrupted.
    Run,
    /// Manage configuration.
    Config {
        /// Configuration action to perform.
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Compute the load cell calibration factor from recorded readings.
    Calibrate(CalibrateArgs),
}

/// Config subcommand actions.
#[derive(Debug, Clone, Copy, Subcommand)]
pub enum ConfigAction {
    /// Create default configuration file.
    Init,
    /// Display current configuration.
    Show,
    /// Print configuration file path.
    Path,
}

/// Arguments for the calibrate command.
#[derive(Debug, Args)]
pub struct CalibrateArgs {
    /// Raw readings taken with the scale empty, one per line.
    #[arg(long)]
    pub tare: PathBuf,

    /// Raw readings taken with the known weight on the scale, one per line.
    #[arg(long)]
    pub loaded: PathBuf,

    /// The known weight in grams.
    #[arg(long, value_parser = parse_threshold)]
    pub known_weight: f64,
}

/// Detection settings that override the configuration file.
#[derive(Debug, Default, Args)]
pub struct DetectionArgs {
    /// Enable camera motion detection.
    #[arg(long, global = true, env = "BIRDFEEDER_MOTION_ENABLED")]
    pub motion_enabled: Option<bool>,

    /// Motion score a frame pair must exceed.
    #[arg(long, global = true, value_parser = parse_threshold, env = "BIRDFEEDER_MOTION_THRESHOLD")]
    pub motion_threshold: Option<f64>,

    /// Motion score reduction.
    #[arg(long, global = true, value_enum, env = "BIRDFEEDER_MOTION_SCORE")]
    pub motion_score: Option<ScoreMode>,

    /// Quiet frames before a visit ends.
    #[arg(long, global = true, value_parser = clap::value_parser!(u32).range(1..),
          env = "BIRDFEEDER_FRAMES_BEFORE_DEPARTURE")]
    pub frames_before_departure: Option<u32>,

    /// Enable weight detection.
    #[arg(long, global = true, env = "BIRDFEEDER_SCALE_ENABLED")]
    pub scale_enabled: Option<bool>,

    /// Weight sensor backend.
    #[arg(long, global = true, value_enum, env = "BIRDFEEDER_SCALE_BACKEND")]
    pub scale_backend: Option<ScaleBackendKind>,

    /// Serial device of the weight reporter.
    #[arg(long, global = true, env = "BIRDFEEDER_SCALE_PORT")]
    pub scale_port: Option<PathBuf>,

    /// Weight in grams a reading must exceed.
    #[arg(long, global = true, value_parser = parse_threshold, env = "BIRDFEEDER_WEIGHT_THRESHOLD")]
    pub weight_threshold: Option<f64>,

    /// Seconds to wait for a weight reading after a trigger.
    #[arg(long, global = true, value_parser = parse_seconds, env = "BIRDFEEDER_SCALE_WAIT_TIME")]
    pub scale_wait_time: Option<f64>,

    /// Minimum seconds between two photos.
    #[arg(long, global = true, value_parser = parse_seconds, env = "BIRDFEEDER_PHOTO_COOLDOWN")]
    pub photo_cooldown: Option<f64>,

    /// Frames discarded at startup for auto-exposure.
    #[arg(long, global = true, env = "BIRDFEEDER_CAMERA_WARMUP_FRAMES")]
    pub camera_warmup_frames: Option<u32>,

    /// Milliseconds between detection ticks.
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..),
          env = "BIRDFEEDER_SENSOR_CHECK_INTERVAL_MS")]
    pub sensor_check_interval_ms: Option<u64>,

    /// Directory photos are stored in.
    #[arg(long, global = true, env = "BIRDFEEDER_IMAGES_DIR")]
    pub images_dir: Option<PathBuf>,

    /// Enable cloud upload.
    #[arg(long, global = true, env = "BIRDFEEDER_UPLOAD_ENABLED")]
    pub upload_enabled: Option<bool>,

    /// Upload service URL.
    #[arg(long, global = true, env = "BIRDFEEDER_UPLOAD_URL")]
    pub upload_url: Option<String>,

    /// Feeder location sent with uploads.
    #[arg(long, global = true, env = "BIRDFEEDER_LOCATION")]
    pub location: Option<String>,
}

impl DetectionArgs {
    /// Apply every given override to `config`.
    pub fn apply(&self, config: &mut Config) {
        if let Some(enabled) = self.motion_enabled {
            config.motion.enabled = enabled;
        }
        if let Some(threshold) = self.motion_threshold {
            config.motion.threshold = threshold;
        }
        if let Some(score) = self.motion_score {
            config.motion.score = score;
        }
        if let Some(frames) = self.frames_before_departure {
            config.motion.frames_before_departure = frames;
        }
        if let Some(enabled) = self.scale_enabled {
            config.scale.enabled = enabled;
        }
        if let Some(backend) = self.scale_backend {
            config.scale.backend = backend;
        }
        if let Some(port) = &self.scale_port {
            config.scale.serial.port.clone_from(port);
        }
        if let Some(threshold) = self.weight_threshold {
            config.scale.threshold_grams = threshold;
        }
        if let Some(wait) = self.scale_wait_time {
            config.scale.wait_time_secs = wait;
        }
        if let Some(cooldown) = self.photo_cooldown {
            config.capture.photo_cooldown_secs = cooldown;
        }
        if let Some(frames) = self.camera_warmup_frames {
            config.camera.warmup_frames = frames;
        }
        if let Some(interval) = self.sensor_check_interval_ms {
            config.capture.sensor_check_interval_ms = interval;
        }
        if let Some(dir) = &self.images_dir {
            config.capture.images_dir.clone_from(dir);
        }
        if let Some(enabled) = self.upload_enabled {
            config.upload.enabled = enabled;
        }
        if let Some(url) = &self.upload_url {
            config.upload.service_url.clone_from(url);
        }
        if let Some(location) = &self.location {
            config.upload.location = Some(location.clone());
        }
    }
}
