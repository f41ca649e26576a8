//! HX711 load cell read directly on this host.
//!
//! Raw counts come from the Linux IIO interface of the `hx711` kernel driver,
//! one integer per read of the channel file.

use crate::config::DirectScaleConfig;
use crate::constants::scale::{MIN_OUTLIERS, OUTLIER_FRACTION, SAMPLE_SPACING_MS};
use crate::detection::WeightSample;
use crate::error::{Error, Result};
use crate::sensors::WeightSource;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, trace};

/// Reduce noisy raw samples to one value.
///
/// Drops `max(3, 40%)` of the samples from each end and takes the median of
/// what is left, or the median of everything if fewer than three remain.
/// Returns `None` for an empty slice.
pub fn stable_reading(samples: &mut [f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    samples.sort_by(f64::total_cmp);

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let outliers = MIN_OUTLIERS.max((samples.len() as f64 * OUTLIER_FRACTION) as usize);

    let trimmed = if samples.len() > outliers * 2 {
        &samples[outliers..samples.len() - outliers]
    } else {
        &[]
    };

    if trimmed.len() >= 3 {
        Some(trimmed[trimmed.len() / 2])
    } else {
        Some(samples[samples.len() / 2])
    }
}

/// HX711 sampled through its raw count file.
#[derive(Debug, Clone)]
pub struct DirectScale {
    raw_path: PathBuf,
    reference_unit: f64,
    samples: usize,
    offset: f64,
}

impl DirectScale {
    /// Create an untared scale from configuration.
    pub fn from_config(config: &DirectScaleConfig) -> Self {
        Self {
            raw_path: config.raw_path.clone(),
            reference_unit: config.reference_unit,
            samples: config.samples.max(1),
            offset: 0.0,
        }
    }

    /// Raw count currently treated as zero grams.
    pub fn offset(&self) -> f64 {
        self.offset
    }

    async fn read_raw(path: &Path) -> Result<f64> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::SensorRead {
                reason: format!("{}: {e}", path.display()),
            })?;
        contents.trim().parse().map_err(|e| Error::SensorRead {
            reason: format!("{}: unparsable raw value '{}': {e}", path.display(), contents.trim()),
        })
    }

    /// Collect up to `self.samples` raw counts, skipping failed reads.
    async fn sample_raw(&self) -> Result<Vec<f64>> {
        let mut values = Vec::with_capacity(self.samples);
        let mut last_error = None;

        for index in 0..self.samples {
            if index > 0 {
                tokio::time::sleep(Duration::from_millis(SAMPLE_SPACING_MS)).await;
            }
            match Self::read_raw(&self.raw_path).await {
                Ok(value) => values.push(value),
                Err(e) => {
                    trace!("Raw sample failed: {e}");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if values.is_empty() => Err(e),
            _ => Ok(values),
        }
    }
}

impl WeightSource for DirectScale {
    async fn read(&mut self) -> Result<WeightSample> {
        let mut raw = self.sample_raw().await?;
        let Some(stable) = stable_reading(&mut raw) else {
            return Ok(WeightSample::invalid());
        };
        Ok(WeightSample::new((stable - self.offset) / self.reference_unit))
    }

    async fn tare(&mut self) -> Result<()> {
        let mut raw = self.sample_raw().await?;
        let stable = stable_reading(&mut raw).ok_or_else(|| Error::SensorRead {
            reason: "no raw samples for tare".to_string(),
        })?;
        debug!("Tare offset {:.1} -> {:.1}", self.offset, stable);
        self.offset = stable;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_stable_reading_rejects_spikes() {
        let mut samples = vec![
            100.0, 101.0, 99.0, 100.0, 5000.0, 100.0, -4000.0, 102.0, 98.0, 100.0,
        ];
        assert_eq!(stable_reading(&mut samples), Some(100.0));
    }

    #[test]
    fn test_stable_reading_small_sample_falls_back_to_median() {
        let mut samples = vec![3.0, 1.0, 2.0];
        assert_eq!(stable_reading(&mut samples), Some(2.0));
    }

    #[test]
    fn test_stable_reading_empty() {
        assert_eq!(stable_reading(&mut []), None);
    }

    fn scale_for(dir: &TempDir, raw: &str) -> DirectScale {
        let path = dir.path().join("in_voltage0_raw");
        std::fs::write(&path, raw).unwrap();
        DirectScale::from_config(&DirectScaleConfig {
            raw_path: path,
            reference_unit: -100.0,
            samples: 3,
        })
    }

    #[tokio::test]
    async fn test_read_applies_offset_and_reference_unit() {
        let dir = TempDir::new().unwrap();
        let mut scale = scale_for(&dir, "8000\n");
        scale.tare().await.unwrap();
        assert_eq!(scale.offset(), 8000.0);

        std::fs::write(dir.path().join("in_voltage0_raw"), "7400\n").unwrap();
        let sample = scale.read().await.unwrap();
        assert_eq!(sample.grams(), Some(6.0));
    }

    #[tokio::test]
    async fn test_missing_device_is_a_read_error() {
        let mut scale = DirectScale::from_config(&DirectScaleConfig {
            raw_path: PathBuf::from("/nonexistent/in_voltage0_raw"),
            reference_unit: 1.0,
            samples: 2,
        });
        let err = scale.read().await.unwrap_err();
        assert!(matches!(err, Error::SensorRead { .. }));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_garbage_raw_value_is_a_read_error() {
        let dir = TempDir::new().unwrap();
        let mut scale = scale_for(&dir, "not-a-number");
        assert!(scale.read().await.is_err());
    }
}
