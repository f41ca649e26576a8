//! Load cell calibration from recorded raw readings.
//!
//! Takes a file of raw counts with the scale empty and one with a known
//! weight on it, and derives the counts-per-gram factor used as the direct
//! backend's `reference_unit`.

use crate::constants::calibration::{
    EXCELLENT_CV, FAIR_CV, GOOD_CV, MIN_OUTLIERS, OUTLIER_FRACTION_DIVISOR,
};
use crate::error::{Error, Result};
use std::path::Path;

/// How consistent the loaded readings were.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    /// Coefficient of variation under 1%.
    Excellent,
    /// Under 3%.
    Good,
    /// Under 5%.
    Fair,
    /// 5% or more.
    Poor,
}

impl Quality {
    fn from_cv(cv_percent: f64) -> Self {
        if cv_percent < EXCELLENT_CV {
            Self::Excellent
        } else if cv_percent < GOOD_CV {
            Self::Good
        } else if cv_percent < FAIR_CV {
            Self::Fair
        } else {
            Self::Poor
        }
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Excellent => write!(f, "Excellent"),
            Self::Good => write!(f, "Good"),
            Self::Fair => write!(f, "Fair"),
            Self::Poor => write!(f, "Poor - consider using shielded cable"),
        }
    }
}

/// Result of a calibration.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationReport {
    /// Known weight in grams.
    pub known_weight: f64,
    /// Mean of the empty-scale readings.
    pub tare_value: f64,
    /// Loaded readings supplied.
    pub total_readings: usize,
    /// Loaded readings left after outlier removal.
    pub readings_used: usize,
    /// Mean tared loaded reading.
    pub average: f64,
    /// Raw counts per gram.
    pub calibration_factor: f64,
    /// Population standard deviation of the used readings.
    pub std_dev: f64,
    /// Standard deviation relative to the average, in percent.
    pub cv_percent: f64,
    /// Grade derived from the coefficient of variation.
    pub quality: Quality,
}

impl std::fmt::Display for CalibrationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Calibration Results:")?;
        writeln!(f, "  Known weight:           {}g", self.known_weight)?;
        writeln!(f, "  Readings collected:     {}", self.total_readings)?;
        writeln!(f, "  Readings used:          {}", self.readings_used)?;
        writeln!(f, "  Average reading:        {:.2}", self.average)?;
        writeln!(f, "  Standard deviation:     {:.2}", self.std_dev)?;
        writeln!(f, "  Coefficient of var.:    {:.1}%", self.cv_percent)?;
        writeln!(f, "  Tare value:             {:.2}", self.tare_value)?;
        writeln!(f, "  Calibration factor:     {:.6}", self.calibration_factor)?;
        writeln!(f, "  Quality:                {}", self.quality)?;
        writeln!(f)?;
        writeln!(f, "Add this to the [scale.direct] section of your config:")?;
        write!(f, "  reference_unit = {:.6}", self.calibration_factor)
    }
}

fn input_error(message: impl Into<String>) -> Error {
    Error::CalibrationInput {
        message: message.into(),
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Derive a calibration from empty (`tare`) and `loaded` raw readings.
///
/// Drops `max(2, n / 5)` loaded readings from each end before averaging.
pub fn calibrate(tare: &[f64], loaded: &[f64], known_weight: f64) -> Result<CalibrationReport> {
    if !known_weight.is_finite() || known_weight <= 0.0 {
        return Err(input_error(format!(
            "known weight must be positive, got {known_weight}"
        )));
    }
    if tare.is_empty() {
        return Err(input_error("no tare readings"));
    }

    let tare_value = mean(tare);
    let mut tared: Vec<f64> = loaded.iter().map(|raw| raw - tare_value).collect();
    tared.sort_by(f64::total_cmp);

    let outliers = MIN_OUTLIERS.max(tared.len() / OUTLIER_FRACTION_DIVISOR);
    if tared.len() <= outliers * 2 {
        return Err(input_error(format!(
            "need more than {} loaded readings, got {}",
            outliers * 2,
            tared.len()
        )));
    }
    let used = &tared[outliers..tared.len() - outliers];

    let average = mean(used);
    if average == 0.0 {
        return Err(input_error("loaded readings equal the tare value"));
    }
    let variance = mean(&used.iter().map(|x| (x - average).powi(2)).collect::<Vec<_>>());
    let std_dev = variance.sqrt();
    let cv_percent = std_dev / average.abs() * 100.0;

    Ok(CalibrationReport {
        known_weight,
        tare_value,
        total_readings: tared.len(),
        readings_used: used.len(),
        average,
        calibration_factor: average / known_weight,
        std_dev,
        cv_percent,
        quality: Quality::from_cv(cv_percent),
    })
}

/// Read one raw value per line, ignoring blank lines and `#` comments.
pub fn read_readings(path: &Path) -> Result<Vec<f64>> {
    let contents = std::fs::read_to_string(path).map_err(|source| Error::CalibrationRead {
        path: path.to_path_buf(),
        source,
    })?;

    contents
        .lines()
        .enumerate()
        .map(|(index, line)| (index, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(index, line)| {
            line.parse::<f64>().map_err(|e| {
                input_error(format!(
                    "{}:{}: invalid reading '{line}': {e}",
                    path.display(),
                    index + 1
                ))
            })
        })
        .collect()
}
