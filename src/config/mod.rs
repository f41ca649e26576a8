//! Configuration loading and management.

mod file;
mod paths;
mod types;
mod validate;

pub use file::{load_config_file, save_config};
pub use paths::config_file_path;
pub use types::{
    CameraConfig, CaptureConfig, Config, DirectScaleConfig, MotionConfig, ScaleBackendKind,
    ScaleConfig, ScoreMode, SerialScaleConfig, UploadConfig,
};
pub use validate::{detection_mode, seconds, validate_config};
