//! Motion debouncing.

use super::{DetectionEvent, MotionScore};

/// Turns per-tick motion scores into a stable "motion present" flag.
///
/// A score strictly above the threshold activates motion immediately. Motion
/// only clears after `frames_before_departure` consecutive scores at or below
/// the threshold, so single-frame camera dropouts do not end a visit.
#[derive(Debug, Clone)]
pub struct MotionDebouncer {
    threshold: f64,
    frames_before_departure: u32,
    active: bool,
    quiet_ticks: u32,
}

impl MotionDebouncer {
    /// Create an inactive debouncer.
    pub fn new(threshold: f64, frames_before_departure: u32) -> Self {
        Self {
            threshold,
            frames_before_departure,
            active: false,
            quiet_ticks: 0,
        }
    }

    /// Whether motion is currently considered present.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Consecutive quiet ticks seen so far.
    pub fn quiet_ticks(&self) -> u32 {
        self.quiet_ticks
    }

    /// Feed one tick's score; returns an event on a state change.
    pub fn observe(&mut self, score: MotionScore) -> Option<DetectionEvent> {
        if score.value() > self.threshold {
            self.quiet_ticks = 0;
            if self.active {
                return None;
            }
            self.active = true;
            return Some(DetectionEvent::MotionDetected);
        }

        self.quiet_ticks = self.quiet_ticks.saturating_add(1);
        if self.active && self.quiet_ticks >= self.frames_before_departure {
            self.active = false;
            return Some(DetectionEvent::MotionCleared);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(debouncer: &mut MotionDebouncer, scores: &[f64]) -> Vec<Option<DetectionEvent>> {
        scores
            .iter()
            .map(|&s| debouncer.observe(MotionScore::new(s)))
            .collect()
    }

    #[test]
    fn test_scenario_motion_only_visit() {
        let mut debouncer = MotionDebouncer::new(1000.0, 2);
        let events = feed(&mut debouncer, &[0.0, 1500.0, 1500.0, 200.0, 200.0, 200.0]);
        assert_eq!(
            events,
            vec![
                None,
                Some(DetectionEvent::MotionDetected),
                None,
                None,
                Some(DetectionEvent::MotionCleared),
                None,
            ]
        );
    }

    #[test]
    fn test_score_equal_to_threshold_is_quiet() {
        let mut debouncer = MotionDebouncer::new(1000.0, 1);
        assert_eq!(debouncer.observe(MotionScore::new(1000.0)), None);
        assert!(!debouncer.is_active());

        debouncer.observe(MotionScore::new(1000.1));
        assert!(debouncer.is_active());
        assert_eq!(
            debouncer.observe(MotionScore::new(1000.0)),
            Some(DetectionEvent::MotionCleared)
        );
    }

    #[test]
    fn test_single_quiet_frame_does_not_end_visit() {
        let mut debouncer = MotionDebouncer::new(10.0, 3);
        let events = feed(&mut debouncer, &[50.0, 0.0, 50.0, 0.0, 0.0, 50.0]);
        assert_eq!(events[0], Some(DetectionEvent::MotionDetected));
        assert!(events[1..].iter().all(Option::is_none));
        assert!(debouncer.is_active());
    }

    #[test]
    fn test_active_iff_recent_motion_property() {
        // Exhaustive over all short sequences of below / equal / above scores.
        const THRESHOLD: f64 = 1000.0;
        let alphabet = [500.0, THRESHOLD, 1500.0];

        for frames_before_departure in 1..=3_u32 {
            for len in 0..=7_u32 {
                for code in 0..3_usize.pow(len) {
                    let mut rest = code;
                    let mut debouncer = MotionDebouncer::new(THRESHOLD, frames_before_departure);
                    let mut last_above: Option<usize> = None;

                    for i in 0..len as usize {
                        let score = alphabet[rest % 3];
                        rest /= 3;
                        let was_active = debouncer.is_active();
                        let event = debouncer.observe(MotionScore::new(score));

                        if score > THRESHOLD {
                            last_above = Some(i);
                        }
                        let quiet_since = last_above.map(|j| i - j);
                        let expected = quiet_since
                            .is_some_and(|q| q < frames_before_departure as usize);
                        assert_eq!(debouncer.is_active(), expected);

                        let changed = was_active != debouncer.is_active();
                        assert_eq!(event.is_some(), changed);
                    }
                }
            }
        }
    }
}
