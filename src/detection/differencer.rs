//! Frame differencing.
//!
//! Reduces two successive frames to a single motion score. Only the most
//! recent frame is retained; there is no background model.

use super::Frame;
use crate::config::ScoreMode;
use crate::error::{Error, Result};

/// Non-negative scalar describing how much two frames differ.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct MotionScore(f64);

impl MotionScore {
    /// Wrap a raw score, clamping negatives to zero.
    pub fn new(value: f64) -> Self {
        Self(value.max(0.0))
    }

    /// The score value.
    pub fn value(self) -> f64 {
        self.0
    }
}

impl std::fmt::Display for MotionScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.1}", self.0)
    }
}

/// Scores each frame against the one before it.
#[derive(Debug)]
pub struct FrameDifferencer {
    mode: ScoreMode,
    pixel_delta: u8,
    previous: Option<Frame>,
}

impl FrameDifferencer {
    /// Create a differencer with no prior frame.
    pub fn new(mode: ScoreMode, pixel_delta: u8) -> Self {
        Self {
            mode,
            pixel_delta,
            previous: None,
        }
    }

    /// Score `frame` against the previous frame and retain it.
    ///
    /// Returns `Ok(None)` for the first frame. Frames of different sizes are
    /// a fatal configuration error.
    pub fn score(&mut self, frame: Frame) -> Result<Option<MotionScore>> {
        let score = match &self.previous {
            None => None,
            Some(previous) => {
                if (previous.width(), previous.height()) != (frame.width(), frame.height()) {
                    return Err(Error::FrameDimensionMismatch {
                        expected_width: previous.width(),
                        expected_height: previous.height(),
                        actual_width: frame.width(),
                        actual_height: frame.height(),
                    });
                }
                Some(self.compare(previous, &frame))
            }
        };

        self.previous = Some(frame);
        Ok(score)
    }

    #[allow(clippy::cast_precision_loss)]
    fn compare(&self, previous: &Frame, current: &Frame) -> MotionScore {
        let deltas = previous
            .intensities()
            .iter()
            .zip(current.intensities())
            .map(|(&a, &b)| a.abs_diff(b));

        let value = match self.mode {
            ScoreMode::Sum => deltas.map(u64::from).sum::<u64>() as f64,
            ScoreMode::Mean => {
                let pixels = current.intensities().len();
                if pixels == 0 {
                    0.0
                } else {
                    deltas.map(u64::from).sum::<u64>() as f64 / pixels as f64
                }
            }
            ScoreMode::ChangedPixels => deltas.filter(|&d| d > self.pixel_delta).count() as f64,
        };

        MotionScore::new(value)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn uniform(width: u32, height: u32, level: u8) -> Frame {
        Frame::new(GrayImage::from_pixel(width, height, Luma([level])))
    }

    #[test]
    fn test_first_frame_is_not_scored() {
        let mut differencer = FrameDifferencer::new(ScoreMode::Sum, 30);
        assert!(differencer.score(uniform(4, 4, 10)).unwrap().is_none());
    }

    #[test]
    fn test_sum_of_absolute_deltas() {
        let mut differencer = FrameDifferencer::new(ScoreMode::Sum, 30);
        differencer.score(uniform(10, 1, 150)).unwrap();
        let score = differencer.score(uniform(10, 1, 0)).unwrap().unwrap();
        assert_eq!(score.value(), 1500.0);
    }

    #[test]
    fn test_mean_of_absolute_deltas() {
        let mut differencer = FrameDifferencer::new(ScoreMode::Mean, 30);
        differencer.score(uniform(2, 2, 100)).unwrap();
        let mut next = GrayImage::from_pixel(2, 2, Luma([100]));
        next.put_pixel(0, 0, Luma([60]));
        let score = differencer.score(Frame::new(next)).unwrap().unwrap();
        assert_eq!(score.value(), 10.0);
    }

    #[test]
    fn test_changed_pixels_counts_strictly_above_delta() {
        let mut differencer = FrameDifferencer::new(ScoreMode::ChangedPixels, 30);
        differencer.score(uniform(3, 1, 100)).unwrap();
        let mut next = GrayImage::from_pixel(3, 1, Luma([100]));
        next.put_pixel(0, 0, Luma([130]));
        next.put_pixel(1, 0, Luma([131]));
        next.put_pixel(2, 0, Luma([50]));
        let score = differencer.score(Frame::new(next)).unwrap().unwrap();
        assert_eq!(score.value(), 2.0);
    }

    #[test]
    fn test_identical_frames_score_zero() {
        for mode in [ScoreMode::Sum, ScoreMode::Mean, ScoreMode::ChangedPixels] {
            let mut differencer = FrameDifferencer::new(mode, 30);
            let frame = uniform(8, 8, 77);
            differencer.score(frame.clone()).unwrap();
            let score = differencer.score(frame).unwrap().unwrap();
            assert_eq!(score.value(), 0.0, "mode {mode}");
        }
    }

    #[test]
    fn test_dimension_change_is_fatal() {
        let mut differencer = FrameDifferencer::new(ScoreMode::Sum, 30);
        differencer.score(uniform(4, 4, 0)).unwrap();
        let err = differencer.score(uniform(4, 5, 0)).unwrap_err();
        assert!(matches!(err, Error::FrameDimensionMismatch { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_negative_score_clamped() {
        assert_eq!(MotionScore::new(-3.0).value(), 0.0);
    }
}
