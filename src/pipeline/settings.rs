//! Detection loop settings.

use crate::config::{Config, ScoreMode, detection_mode, seconds, validate_config};
use crate::detection::DetectionMode;
use crate::error::Result;
use std::time::Duration;

/// Validated, loop-ready view of the configuration.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// Which sensors drive presence.
    pub mode: DetectionMode,
    /// Score a frame pair must strictly exceed.
    pub motion_threshold: f64,
    /// Quiet ticks before motion clears.
    pub frames_before_departure: u32,
    /// Frame difference reduction.
    pub score_mode: ScoreMode,
    /// Per-pixel delta for the changed-pixels score.
    pub pixel_delta: u8,
    /// Weight a reading must strictly exceed.
    pub weight_threshold_grams: f64,
    /// Bound on the settle-wait.
    pub scale_wait: Duration,
    /// Re-zero the scale after each visit.
    pub tare_on_departure: bool,
    /// Minimum time between two photos.
    pub photo_cooldown: Duration,
    /// Frames discarded before the first tick.
    pub camera_warmup_frames: u32,
    /// Tick period, also the settle-wait poll interval.
    pub sensor_check_interval: Duration,
    /// Quality of stored photos.
    pub jpeg_quality: u8,
}

impl MonitorSettings {
    /// Validate `config` and extract the loop settings.
    pub fn from_config(config: &Config) -> Result<Self> {
        validate_config(config)?;
        Ok(Self {
            mode: detection_mode(config)?,
            motion_threshold: config.motion.threshold,
            frames_before_departure: config.motion.frames_before_departure,
            score_mode: config.motion.score,
            pixel_delta: config.motion.pixel_delta,
            weight_threshold_grams: config.scale.threshold_grams,
            scale_wait: if config.scale.enabled {
                seconds("scale.wait_time_secs", config.scale.wait_time_secs)?
            } else {
                Duration::ZERO
            },
            tare_on_departure: config.scale.tare_on_departure,
            photo_cooldown: seconds("capture.photo_cooldown_secs", config.capture.photo_cooldown_secs)?,
            camera_warmup_frames: config.camera.warmup_frames,
            sensor_check_interval: Duration::from_millis(config.capture.sensor_check_interval_ms),
            jpeg_quality: config.capture.jpeg_quality,
        })
    }
}
