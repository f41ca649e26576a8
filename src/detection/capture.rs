//! Capture gating and capture records.

use crate::constants::capture::{FILENAME_PREFIX, IMAGE_EXTENSION, TIMESTAMP_FORMAT};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Which sensor evidence produced a photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionType {
    /// Camera motion alone.
    Motion,
    /// Scale alone.
    Weight,
    /// Motion, corroborated by a weight reading in the settle-wait.
    Both,
}

impl std::fmt::Display for DetectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Motion => write!(f, "motion"),
            Self::Weight => write!(f, "weight"),
            Self::Both => write!(f, "both"),
        }
    }
}

/// A photo taken during a visit.
///
/// Built by the capture path and handed to the uploader by value once stored.
#[derive(Debug, Clone)]
pub struct CaptureRecord {
    /// Encoded JPEG bytes.
    pub image: Vec<u8>,
    /// Weight confirmed during this visit's settle-wait, if any.
    pub weight_grams: Option<f64>,
    /// When the photo was taken.
    pub captured_at: DateTime<Local>,
    /// What triggered the photo.
    pub detection: DetectionType,
}

impl CaptureRecord {
    /// Stored filename: `bird_<timestamp>_<weight>_<type>.jpg`.
    pub fn file_name(&self) -> String {
        let weight = self
            .weight_grams
            .map_or_else(|| "None".to_string(), |g| format!("{g:.2}g"));
        format!(
            "{FILENAME_PREFIX}_{}_{weight}_{}.{IMAGE_EXTENSION}",
            self.captured_at.format(TIMESTAMP_FORMAT),
            self.detection
        )
    }
}

/// Enforces the minimum interval between photos.
///
/// The cooldown only starts once a photo has actually been stored; a failed
/// capture leaves the gate open for the next arrival.
#[derive(Debug, Clone)]
pub struct CaptureGate {
    cooldown: Duration,
    last_capture: Option<Instant>,
}

impl CaptureGate {
    /// Create a gate that has never captured.
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_capture: None,
        }
    }

    /// Time left before another photo may be taken at `now`.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        let last = self.last_capture?;
        let elapsed = now.saturating_duration_since(last);
        (elapsed < self.cooldown).then(|| self.cooldown - elapsed)
    }

    /// Whether a photo may be taken at `now`.
    pub fn is_open(&self, now: Instant) -> bool {
        self.remaining(now).is_none()
    }

    /// Start the cooldown from a successful capture at `at`.
    pub fn record_capture(&mut self, at: Instant) {
        self.last_capture = Some(at);
    }

    /// When the last photo was taken.
    pub fn last_capture(&self) -> Option<Instant> {
        self.last_capture
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(weight_grams: Option<f64>, detection: DetectionType) -> CaptureRecord {
        CaptureRecord {
            image: Vec::new(),
            weight_grams,
            captured_at: Local
                .with_ymd_and_hms(2026, 5, 17, 7, 30, 5)
                .single()
                .unwrap_or_else(Local::now),
            detection,
        }
    }

    #[test]
    fn test_file_name_with_weight() {
        let name = record(Some(11.456), DetectionType::Both).file_name();
        assert_eq!(name, "bird_20260517_073005_11.46g_both.jpg");
    }

    #[test]
    fn test_file_name_without_weight() {
        let name = record(None, DetectionType::Motion).file_name();
        assert_eq!(name, "bird_20260517_073005_None_motion.jpg");
    }

    #[test]
    fn test_gate_open_before_first_capture() {
        let gate = CaptureGate::new(Duration::from_secs(5));
        assert!(gate.is_open(Instant::now()));
    }

    #[test]
    fn test_cooldown_window() {
        let start = Instant::now();
        let mut gate = CaptureGate::new(Duration::from_secs(5));
        gate.record_capture(start);

        assert!(!gate.is_open(start + Duration::from_secs(2)));
        assert_eq!(
            gate.remaining(start + Duration::from_secs(2)),
            Some(Duration::from_secs(3))
        );
        assert!(gate.is_open(start + Duration::from_secs(5)));
        assert!(gate.is_open(start + Duration::from_secs(6)));
    }

    #[test]
    fn test_no_two_captures_inside_cooldown() {
        // Arrivals every 700ms for 30s; captures must stay >= cooldown apart.
        let cooldown = Duration::from_secs(5);
        let start = Instant::now();
        let mut gate = CaptureGate::new(cooldown);
        let mut captures = Vec::new();

        for step in 0..43_u32 {
            let now = start + Duration::from_millis(700) * step;
            if gate.is_open(now) {
                gate.record_capture(now);
                captures.push(now);
            }
        }

        assert!(captures.len() > 1);
        for pair in captures.windows(2) {
            assert!(pair[1] - pair[0] >= cooldown);
        }
    }

    #[test]
    fn test_detection_type_serializes_lowercase() {
        let json = serde_json::to_string(&DetectionType::Weight).unwrap_or_default();
        assert_eq!(json, "\"weight\"");
    }
}
