//! Application-wide constants.
//!
//! All magic numbers and strings are defined here to ensure consistency
//! and make changes easy to track.

/// Application name used for config directories and user-facing messages.
pub const APP_NAME: &str = "birdfeeder";

/// Name of the config file inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Default interval between detection ticks in milliseconds.
pub const DEFAULT_SENSOR_CHECK_INTERVAL_MS: u64 = 200;

/// Motion detection defaults.
pub mod motion {
    /// Default motion score threshold. A score must be strictly above it.
    pub const DEFAULT_THRESHOLD: f64 = 1000.0;

    /// Default number of consecutive quiet ticks before a visit ends.
    pub const DEFAULT_FRAMES_BEFORE_DEPARTURE: u32 = 10;

    /// Default per-pixel intensity delta counted by the changed-pixels score.
    pub const DEFAULT_PIXEL_DELTA: u8 = 30;
}

/// Weight sensing defaults.
pub mod scale {
    /// Default weight threshold in grams.
    ///
    /// The lightest British songbird, the goldcrest, weighs about 5g.
    pub const DEFAULT_THRESHOLD_GRAMS: f64 = 5.0;

    /// Default settle-wait after a trigger, in seconds.
    pub const DEFAULT_WAIT_TIME_SECS: f64 = 1.0;

    /// Default HX711 reference unit for the direct backend.
    pub const DEFAULT_REFERENCE_UNIT: f64 = -388.929_792;

    /// Default number of raw samples per direct-backend reading.
    pub const DEFAULT_SAMPLES: usize = 35;

    /// Delay between raw samples on the direct backend, in milliseconds.
    pub const SAMPLE_SPACING_MS: u64 = 20;

    /// Fraction of raw samples dropped from each end before taking the median.
    pub const OUTLIER_FRACTION: f64 = 0.4;

    /// Minimum number of raw samples dropped from each end.
    pub const MIN_OUTLIERS: usize = 3;

    /// Default serial device of the Pico weight reporter.
    pub const DEFAULT_SERIAL_PORT: &str = "/dev/ttyACM0";

    /// Default age in seconds after which a serial reading is considered stale.
    pub const DEFAULT_SERIAL_TIMEOUT_SECS: f64 = 2.0;

    /// Default time in seconds to wait for the Pico `READY` line.
    pub const DEFAULT_READY_TIMEOUT_SECS: f64 = 5.0;

    /// Default Linux IIO raw channel exposed by the hx711 kernel driver.
    pub const DEFAULT_RAW_PATH: &str = "/sys/bus/iio/devices/iio:device0/in_voltage0_raw";
}

/// Pico serial line protocol.
pub mod pico {
    /// Sent once by the device after initialisation.
    pub const READY: &str = "READY";
    /// Prefix of a weight report line.
    pub const WEIGHT_PREFIX: &str = "WEIGHT:";
    /// Prefix of an error report line.
    pub const ERROR_PREFIX: &str = "ERROR:";
    /// Error code sent when the load cell produced no usable samples.
    pub const NO_READING: &str = "NO_READING";
    /// Sent when a tare starts.
    pub const TARING: &str = "TARING";
    /// Sent when a tare completes.
    pub const TARED: &str = "TARED";
    /// Reply to `PING`.
    pub const PONG: &str = "PONG";
    /// Tare command.
    pub const TARE_COMMAND: &[u8] = b"TARE\n";
}

/// Camera defaults.
pub mod camera {
    /// Default streaming program.
    pub const DEFAULT_COMMAND: &str = "rpicam-vid";

    /// Default arguments: no preview, run forever, 10 fps MJPEG to stdout.
    pub const DEFAULT_ARGS: &[&str] = &[
        "-n",
        "-t",
        "0",
        "--codec",
        "mjpeg",
        "--framerate",
        "10",
        "-o",
        "-",
    ];

    /// Default number of frames discarded at startup for auto-exposure.
    pub const DEFAULT_WARMUP_FRAMES: u32 = 5;

    /// Default bound on waiting for the next frame, in seconds.
    pub const DEFAULT_TIMEOUT_SECS: f64 = 5.0;
}

/// Capture defaults.
pub mod capture {
    /// Default directory for stored photos.
    pub const DEFAULT_IMAGES_DIR: &str = "./images";

    /// Default minimum time between two photos, in seconds.
    pub const DEFAULT_PHOTO_COOLDOWN_SECS: f64 = 5.0;

    /// Default JPEG quality.
    pub const DEFAULT_JPEG_QUALITY: u8 = 90;

    /// Photo filename prefix.
    pub const FILENAME_PREFIX: &str = "bird";

    /// Timestamp format used in photo filenames.
    pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

    /// Photo file extension.
    pub const IMAGE_EXTENSION: &str = "jpg";

    /// Metadata sidecar extension.
    pub const METADATA_EXTENSION: &str = "json";

    /// Suffix used while a file is being written.
    pub const PARTIAL_SUFFIX: &str = ".partial";
}

/// Upload defaults.
pub mod upload {
    /// Default user id sent with uploads.
    pub const DEFAULT_USER_ID: &str = "anonymous";

    /// Default request timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Default connect timeout in seconds.
    pub const CONNECT_TIMEOUT_SECS: u64 = 10;

    /// Default number of uploads allowed in flight.
    pub const DEFAULT_MAX_CONCURRENT: usize = 4;

    /// Default number of captures waiting for upload.
    pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

    /// Default time given to in-flight uploads at shutdown, in seconds.
    pub const DEFAULT_DRAIN_TIMEOUT_SECS: u64 = 10;

    /// MIME type of uploaded photos.
    pub const IMAGE_MIME: &str = "image/jpeg";
}

/// Calibration constants.
pub mod calibration {
    /// Fraction of loaded readings dropped from each end.
    pub const OUTLIER_FRACTION_DIVISOR: usize = 5;

    /// Minimum number of loaded readings dropped from each end.
    pub const MIN_OUTLIERS: usize = 2;

    /// Coefficient of variation (percent) below which calibration is excellent.
    pub const EXCELLENT_CV: f64 = 1.0;

    /// Coefficient of variation (percent) below which calibration is good.
    pub const GOOD_CV: f64 = 3.0;

    /// Coefficient of variation (percent) below which calibration is fair.
    pub const FAIR_CV: f64 = 5.0;
}
