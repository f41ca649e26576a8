//! Configuration validation.

use crate::config::Config;
use crate::detection::DetectionMode;
use crate::error::{Error, Result};
use std::time::Duration;

/// Validate the entire configuration.
pub fn validate_config(config: &Config) -> Result<()> {
    detection_mode(config)?;
    validate_motion(config)?;
    validate_scale(config)?;
    validate_camera(config)?;
    validate_capture(config)?;
    validate_upload(config)?;
    Ok(())
}

/// Resolve which sensors drive presence.
pub fn detection_mode(config: &Config) -> Result<DetectionMode> {
    match (config.motion.enabled, config.scale.enabled) {
        (true, true) => Ok(DetectionMode::MotionAndWeight),
        (true, false) => Ok(DetectionMode::MotionOnly),
        (false, true) => Ok(DetectionMode::WeightOnly),
        (false, false) => Err(Error::NoDetectionMechanism),
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::ConfigValidation {
        message: message.into(),
    }
}

/// Convert a non-negative number of seconds from `name` into a [`Duration`].
///
/// Rejects negative, non-finite and out-of-range values.
pub fn seconds(name: &str, value: f64) -> Result<Duration> {
    if value < 0.0 {
        return Err(invalid(format!(
            "{name} must be a non-negative number of seconds, got {value}"
        )));
    }
    Duration::try_from_secs_f64(value)
        .map_err(|e| invalid(format!("{name} is not a usable number of seconds ({value}): {e}")))
}

fn require_positive_secs(name: &str, value: f64) -> Result<()> {
    if seconds(name, value)?.is_zero() {
        return Err(invalid(format!(
            "{name} must be a positive number of seconds, got {value}"
        )));
    }
    Ok(())
}

fn validate_motion(config: &Config) -> Result<()> {
    let motion = &config.motion;
    if !motion.enabled {
        return Ok(());
    }

    if !motion.threshold.is_finite() || motion.threshold <= 0.0 {
        return Err(invalid(format!(
            "motion.threshold must be positive, got {}",
            motion.threshold
        )));
    }

    if motion.frames_before_departure == 0 {
        return Err(invalid("motion.frames_before_departure must be at least 1"));
    }

    Ok(())
}

fn validate_scale(config: &Config) -> Result<()> {
    let scale = &config.scale;
    if !scale.enabled {
        return Ok(());
    }

    if !scale.threshold_grams.is_finite() || scale.threshold_grams <= 0.0 {
        return Err(invalid(format!(
            "scale.threshold_grams must be positive, got {}",
            scale.threshold_grams
        )));
    }

    seconds("scale.wait_time_secs", scale.wait_time_secs)?;
    require_positive_secs("scale.serial.timeout_secs", scale.serial.timeout_secs)?;
    require_positive_secs(
        "scale.serial.ready_timeout_secs",
        scale.serial.ready_timeout_secs,
    )?;

    if scale.direct.reference_unit == 0.0 || !scale.direct.reference_unit.is_finite() {
        return Err(invalid("scale.direct.reference_unit must be non-zero"));
    }

    if scale.direct.samples == 0 {
        return Err(invalid("scale.direct.samples must be at least 1"));
    }

    Ok(())
}

fn validate_camera(config: &Config) -> Result<()> {
    if config.camera.command.trim().is_empty() {
        return Err(invalid("camera.command must not be empty"));
    }
    require_positive_secs("camera.timeout_secs", config.camera.timeout_secs)
}

fn validate_capture(config: &Config) -> Result<()> {
    let capture = &config.capture;

    if capture.sensor_check_interval_ms == 0 {
        return Err(invalid("capture.sensor_check_interval_ms must be positive"));
    }

    seconds("capture.photo_cooldown_secs", capture.photo_cooldown_secs)?;

    if !(1..=100).contains(&capture.jpeg_quality) {
        return Err(invalid(format!(
            "capture.jpeg_quality must be between 1 and 100, got {}",
            capture.jpeg_quality
        )));
    }

    Ok(())
}

fn validate_upload(config: &Config) -> Result<()> {
    let upload = &config.upload;
    if !upload.enabled {
        return Ok(());
    }

    if upload.service_url.trim().is_empty() {
        return Err(invalid(
            "upload.service_url must be set when uploads are enabled",
        ));
    }

    if upload.max_concurrent == 0 {
        return Err(invalid("upload.max_concurrent must be at least 1"));
    }

    if upload.queue_capacity == 0 {
        return Err(invalid("upload.queue_capacity must be at least 1"));
    }

    if upload.timeout_secs == 0 {
        return Err(invalid("upload.timeout_secs must be positive"));
    }

    Ok(())
}
