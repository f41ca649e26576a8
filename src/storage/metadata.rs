//! Capture metadata sidecar.

use crate::constants::capture::TIMESTAMP_FORMAT;
use crate::detection::{CaptureRecord, DetectionType};
use serde::{Deserialize, Serialize};

/// Metadata stored next to each photo and sent with uploads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureMetadata {
    /// Weight in grams confirmed during the visit.
    pub weight: Option<f64>,
    /// What triggered the photo.
    pub detection_type: DetectionType,
    /// Capture time, `YYYYmmdd_HHMMSS` local time.
    pub timestamp: String,
    /// Feeder location, if configured.
    pub location: Option<String>,
    /// Stored photo filename.
    pub filename: String,
}

impl CaptureMetadata {
    /// Describe `record` stored as `filename`.
    pub fn new(record: &CaptureRecord, filename: String, location: Option<String>) -> Self {
        Self {
            weight: record.weight_grams,
            detection_type: record.detection,
            timestamp: record.captured_at.format(TIMESTAMP_FORMAT).to_string(),
            location,
            filename,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Local;

    #[test]
    fn test_serializes_with_camel_case_keys() {
        let record = CaptureRecord {
            image: Vec::new(),
            weight_grams: Some(9.5),
            captured_at: Local::now(),
            detection: DetectionType::Both,
        };
        let metadata = CaptureMetadata::new(&record, "bird.jpg".to_string(), None);
        let json: serde_json::Value = serde_json::to_value(&metadata).unwrap();

        assert_eq!(json["weight"], 9.5);
        assert_eq!(json["detectionType"], "both");
        assert_eq!(json["filename"], "bird.jpg");
        assert!(json["location"].is_null());
        assert_eq!(json["timestamp"].as_str().unwrap().len(), 15);
    }
}
