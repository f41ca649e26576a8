//! Error types for birdfeeder.

use std::path::PathBuf;

/// Result type alias for birdfeeder operations.
pub type Result<T> = std::result::Result<T, Error>;

/// How an error affects the detection loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Invalid configuration; aborts startup.
    Configuration,
    /// A sensor gave no usable signal this tick; the loop continues.
    SensorRead,
    /// A photo could not be taken or stored; the loop continues.
    Capture,
    /// An upload failed; logged by the uploader only.
    Upload,
    /// Anything else that stops the program.
    Fatal,
}

/// Top-level error type for birdfeeder.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration directory could not be determined.
    #[error("could not determine configuration directory for this platform")]
    ConfigDirNotFound,

    /// Failed to read configuration file.
    #[error("failed to read config file '{path}'")]
    ConfigRead {
        /// Path to the config file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse configuration file.
    #[error("failed to parse config file '{path}'")]
    ConfigParse {
        /// Path to the config file.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: toml::de::Error,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    /// Neither motion nor weight detection is enabled.
    #[error("no detection mechanism enabled (enable motion, scale, or both)")]
    NoDetectionMechanism,

    /// Failed to write configuration file.
    #[error("failed to write config file '{path}'")]
    ConfigWrite {
        /// Path to the config file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to serialize configuration.
    #[error("failed to serialize config")]
    ConfigSerialize {
        /// Underlying serialization error.
        #[source]
        source: toml::ser::Error,
    },

    /// Two consecutive frames had different dimensions.
    #[error(
        "camera frame size changed from {expected_width}x{expected_height} to {actual_width}x{actual_height}"
    )]
    FrameDimensionMismatch {
        /// Width of the previous frame.
        expected_width: u32,
        /// Height of the previous frame.
        expected_height: u32,
        /// Width of the new frame.
        actual_width: u32,
        /// Height of the new frame.
        actual_height: u32,
    },

    /// The camera could not produce a frame.
    #[error("camera unavailable: {reason}")]
    CameraUnavailable {
        /// Description of the failure.
        reason: String,
    },

    /// The camera did not produce a frame in time.
    #[error("camera capture timed out after {timeout_secs:.1}s")]
    CameraTimeout {
        /// Configured capture bound.
        timeout_secs: f64,
    },

    /// Failed to decode a camera image.
    #[error("failed to decode camera image")]
    ImageDecode {
        /// Underlying image error.
        #[source]
        source: image::ImageError,
    },

    /// Failed to encode a photo.
    #[error("failed to encode photo")]
    ImageEncode {
        /// Underlying image error.
        #[source]
        source: image::ImageError,
    },

    /// The weight sensor has no fresh reading.
    #[error("weight sensor timed out after {timeout_secs:.1}s")]
    SensorTimeout {
        /// Staleness bound that was exceeded.
        timeout_secs: f64,
    },

    /// The weight sensor could not be read.
    #[error("weight sensor read failed: {reason}")]
    SensorRead {
        /// Description of the failure.
        reason: String,
    },

    /// The scale could not be initialised.
    #[error("failed to connect to scale on '{port}': {reason}")]
    ScaleConnect {
        /// Device path.
        port: PathBuf,
        /// Description of the failure.
        reason: String,
    },

    /// Failed to write a captured photo or its metadata.
    #[error("failed to store capture '{path}'")]
    CapturePersist {
        /// Path being written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to serialize capture metadata.
    #[error("failed to serialize capture metadata")]
    MetadataSerialize {
        /// Underlying serialization error.
        #[source]
        source: serde_json::Error,
    },

    /// Upload request failed.
    #[error("upload to '{url}' failed: {source}")]
    UploadFailed {
        /// Upload endpoint.
        url: String,
        /// Underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Upload service rejected the photo.
    #[error("upload rejected: {reason}")]
    UploadRejected {
        /// Reason reported by the service.
        reason: String,
    },

    /// Failed to read calibration readings.
    #[error("failed to read calibration readings '{path}'")]
    CalibrationRead {
        /// Path to the readings file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Calibration input was unusable.
    #[error("invalid calibration input: {message}")]
    CalibrationInput {
        /// Description of the problem.
        message: String,
    },

    /// Internal error (for unexpected failures).
    #[error("internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl Error {
    /// Classify the error for the detection loop's propagation policy.
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::ConfigDirNotFound
            | Self::ConfigRead { .. }
            | Self::ConfigParse { .. }
            | Self::ConfigValidation { .. }
            | Self::NoDetectionMechanism
            | Self::ConfigWrite { .. }
            | Self::ConfigSerialize { .. }
            | Self::FrameDimensionMismatch { .. }
            | Self::ScaleConnect { .. } => ErrorClass::Configuration,
            Self::CameraUnavailable { .. }
            | Self::CameraTimeout { .. }
            | Self::ImageDecode { .. }
            | Self::SensorTimeout { .. }
            | Self::SensorRead { .. } => ErrorClass::SensorRead,
            Self::ImageEncode { .. }
            | Self::CapturePersist { .. }
            | Self::MetadataSerialize { .. } => ErrorClass::Capture,
            Self::UploadFailed { .. } | Self::UploadRejected { .. } => ErrorClass::Upload,
            Self::Io(_)
            | Self::CalibrationRead { .. }
            | Self::CalibrationInput { .. }
            | Self::Internal { .. } => ErrorClass::Fatal,
        }
    }

    /// Whether the error must stop the detection loop.
    pub const fn is_fatal(&self) -> bool {
        matches!(self.class(), ErrorClass::Configuration | ErrorClass::Fatal)
    }
}
