//! Weight sampling.

use super::DetectionEvent;
use crate::error::Result;
use crate::sensors::WeightSource;
use chrono::{DateTime, Local};
use std::time::Duration;
use tracing::{debug, trace};

/// One reading from the scale.
///
/// An invalid sample means the sensor answered but had no usable value; it is
/// never treated as zero grams.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightSample {
    grams: f64,
    valid: bool,
    read_at: DateTime<Local>,
}

impl WeightSample {
    /// A valid reading taken now. Values may be negative from tare drift.
    pub fn new(grams: f64) -> Self {
        Self {
            grams,
            valid: grams.is_finite(),
            read_at: Local::now(),
        }
    }

    /// A reading with no usable value, taken now.
    pub fn invalid() -> Self {
        Self {
            grams: 0.0,
            valid: false,
            read_at: Local::now(),
        }
    }

    /// The weight, if the reading is valid.
    pub fn grams(&self) -> Option<f64> {
        self.valid.then_some(self.grams)
    }

    /// Whether the reading carries a value.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// When the reading was taken.
    pub fn read_at(&self) -> DateTime<Local> {
        self.read_at
    }
}

/// Turns scale readings into `WeightDetected` / `WeightCleared`.
///
/// Detection needs a reading above the threshold within the settle-wait.
/// Clearing is immediate: one low or invalid reading ends presence. Read
/// errors carry no signal and never change state.
#[derive(Debug, Clone)]
pub struct WeightSampler {
    threshold_grams: f64,
    wait: Duration,
    poll_interval: Duration,
    present: bool,
}

impl WeightSampler {
    /// Create a sampler with no weight present.
    pub fn new(threshold_grams: f64, wait: Duration, poll_interval: Duration) -> Self {
        Self {
            threshold_grams,
            wait,
            poll_interval,
            present: false,
        }
    }

    /// Whether a bird's weight is currently confirmed.
    pub fn is_present(&self) -> bool {
        self.present
    }

    /// Whether `sample` is a valid reading strictly above the threshold.
    pub fn exceeds_threshold(&self, sample: &WeightSample) -> bool {
        sample.grams().is_some_and(|g| g > self.threshold_grams)
    }

    /// Poll `source` until a qualifying reading arrives or the wait elapses.
    ///
    /// The first read happens immediately; later reads are spaced by the
    /// sensor-check interval. The wait is bounded even if a read hangs.
    pub async fn settle_wait<S: WeightSource>(&self, source: &mut S) -> Option<WeightSample> {
        let poll = async {
            loop {
                match source.read().await {
                    Ok(sample) if self.exceeds_threshold(&sample) => return sample,
                    Ok(sample) => trace!("Settle-wait reading below threshold: {:?}", sample.grams()),
                    Err(e) => debug!("Settle-wait read failed: {e}"),
                }
                tokio::time::sleep(self.poll_interval).await;
            }
        };

        match tokio::time::timeout(self.wait, poll).await {
            Ok(sample) => Some(sample),
            Err(_) => {
                debug!(
                    "No weight above {:.1}g within {:.1}s",
                    self.threshold_grams,
                    self.wait.as_secs_f64()
                );
                None
            }
        }
    }

    /// Record a confirmed reading; emits `WeightDetected` on a change.
    pub fn confirm(&mut self, sample: &WeightSample) -> Option<DetectionEvent> {
        if self.present || !self.exceeds_threshold(sample) {
            return None;
        }
        self.present = true;
        Some(DetectionEvent::WeightDetected)
    }

    /// Check a reading taken while weight is present; emits `WeightCleared`
    /// when it is at or below the threshold or invalid.
    pub fn observe(&mut self, reading: &Result<WeightSample>) -> Option<DetectionEvent> {
        let Ok(sample) = reading else {
            return None;
        };
        if !self.present || self.exceeds_threshold(sample) {
            return None;
        }
        self.present = false;
        Some(DetectionEvent::WeightCleared)
    }

    /// Forget any confirmed weight; used when a visit ends.
    pub fn reset(&mut self) {
        self.present = false;
    }
}
