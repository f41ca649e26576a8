//! Configuration type definitions.

use crate::constants::{self, DEFAULT_SENSOR_CHECK_INTERVAL_MS};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Camera motion detection.
    pub motion: MotionConfig,

    /// Weight sensing.
    pub scale: ScaleConfig,

    /// Camera device.
    pub camera: CameraConfig,

    /// Photo capture and tick pacing.
    pub capture: CaptureConfig,

    /// Cloud upload.
    pub upload: UploadConfig,
}

/// Motion detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Whether camera motion drives presence.
    pub enabled: bool,

    /// Score a frame pair must strictly exceed to count as motion.
    pub threshold: f64,

    /// Consecutive quiet ticks before a visit ends.
    pub frames_before_departure: u32,

    /// How two frames are reduced to a score.
    pub score: ScoreMode,

    /// Per-pixel delta counted by [`ScoreMode::ChangedPixels`].
    pub pixel_delta: u8,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: constants::motion::DEFAULT_THRESHOLD,
            frames_before_departure: constants::motion::DEFAULT_FRAMES_BEFORE_DEPARTURE,
            score: ScoreMode::default(),
            pixel_delta: constants::motion::DEFAULT_PIXEL_DELTA,
        }
    }
}

/// Reduction applied to the absolute per-pixel difference of two frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ScoreMode {
    /// Sum of absolute deltas.
    Sum,
    /// Mean absolute delta.
    Mean,
    /// Number of pixels whose delta exceeds the pixel delta.
    #[default]
    ChangedPixels,
}

impl std::fmt::Display for ScoreMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sum => write!(f, "sum"),
            Self::Mean => write!(f, "mean"),
            Self::ChangedPixels => write!(f, "changed_pixels"),
        }
    }
}

/// Weight sensing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleConfig {
    /// Whether the scale is used.
    pub enabled: bool,

    /// Which weight backend is attached.
    pub backend: ScaleBackendKind,

    /// Weight a reading must strictly exceed to count as a bird.
    pub threshold_grams: f64,

    /// Settle-wait after a trigger, in seconds.
    pub wait_time_secs: f64,

    /// Re-tare the scale after each departure.
    pub tare_on_departure: bool,

    /// Pico serial backend.
    pub serial: SerialScaleConfig,

    /// Direct HX711 backend.
    pub direct: DirectScaleConfig,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            backend: ScaleBackendKind::default(),
            threshold_grams: constants::scale::DEFAULT_THRESHOLD_GRAMS,
            wait_time_secs: constants::scale::DEFAULT_WAIT_TIME_SECS,
            tare_on_departure: true,
            serial: SerialScaleConfig::default(),
            direct: DirectScaleConfig::default(),
        }
    }
}

/// Weight backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ScaleBackendKind {
    /// Pico microcontroller reporting over USB serial.
    #[default]
    Serial,
    /// HX711 read directly on this host.
    Direct,
}

impl std::fmt::Display for ScaleBackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Serial => write!(f, "serial"),
            Self::Direct => write!(f, "direct"),
        }
    }
}

/// Pico serial backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialScaleConfig {
    /// Serial device path.
    pub port: PathBuf,

    /// Age in seconds after which the latest reading is stale.
    pub timeout_secs: f64,

    /// Time in seconds to wait for the device's `READY` line.
    pub ready_timeout_secs: f64,
}

impl Default for SerialScaleConfig {
    fn default() -> Self {
        Self {
            port: PathBuf::from(constants::scale::DEFAULT_SERIAL_PORT),
            timeout_secs: constants::scale::DEFAULT_SERIAL_TIMEOUT_SECS,
            ready_timeout_secs: constants::scale::DEFAULT_READY_TIMEOUT_SECS,
        }
    }
}

/// Direct HX711 backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectScaleConfig {
    /// Raw count file exposed by the hx711 IIO driver.
    pub raw_path: PathBuf,

    /// Raw counts per gram.
    pub reference_unit: f64,

    /// Raw samples per reading.
    pub samples: usize,
}

impl Default for DirectScaleConfig {
    fn default() -> Self {
        Self {
            raw_path: PathBuf::from(constants::scale::DEFAULT_RAW_PATH),
            reference_unit: constants::scale::DEFAULT_REFERENCE_UNIT,
            samples: constants::scale::DEFAULT_SAMPLES,
        }
    }
}

/// Camera settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Program that streams MJPEG frames to stdout.
    pub command: String,

    /// Arguments passed to the program.
    pub args: Vec<String>,

    /// Frames discarded once at startup.
    pub warmup_frames: u32,

    /// Bound on a single capture, in seconds.
    pub timeout_secs: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            command: constants::camera::DEFAULT_COMMAND.to_string(),
            args: constants::camera::DEFAULT_ARGS
                .iter()
                .map(ToString::to_string)
                .collect(),
            warmup_frames: constants::camera::DEFAULT_WARMUP_FRAMES,
            timeout_secs: constants::camera::DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Photo capture settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Directory photos are stored in.
    pub images_dir: PathBuf,

    /// Minimum time between two photos, in seconds.
    pub photo_cooldown_secs: f64,

    /// JPEG quality (1-100).
    pub jpeg_quality: u8,

    /// Interval between detection ticks, in milliseconds.
    pub sensor_check_interval_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            images_dir: PathBuf::from(constants::capture::DEFAULT_IMAGES_DIR),
            photo_cooldown_secs: constants::capture::DEFAULT_PHOTO_COOLDOWN_SECS,
            jpeg_quality: constants::capture::DEFAULT_JPEG_QUALITY,
            sensor_check_interval_ms: DEFAULT_SENSOR_CHECK_INTERVAL_MS,
        }
    }
}

/// Cloud upload settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Whether photos are uploaded.
    pub enabled: bool,

    /// Upload endpoint.
    pub service_url: String,

    /// User id sent with each photo.
    pub user_id: String,

    /// Optional feeder location sent in metadata.
    pub location: Option<String>,

    /// Request timeout in seconds.
    pub timeout_secs: u64,

    /// Uploads allowed in flight at once.
    pub max_concurrent: usize,

    /// Captures waiting for upload before new ones are left on disk only.
    pub queue_capacity: usize,

    /// Time given to in-flight uploads at shutdown, in seconds.
    pub drain_timeout_secs: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            service_url: String::new(),
            user_id: constants::upload::DEFAULT_USER_ID.to_string(),
            location: None,
            timeout_secs: constants::upload::DEFAULT_TIMEOUT_SECS,
            max_concurrent: constants::upload::DEFAULT_MAX_CONCURRENT,
            queue_capacity: constants::upload::DEFAULT_QUEUE_CAPACITY,
            drain_timeout_secs: constants::upload::DEFAULT_DRAIN_TIMEOUT_SECS,
        }
    }
}
