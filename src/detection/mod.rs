//! Presence detection: frame differencing, debouncing, weight confirmation,
//! sensor fusion and capture gating.
//!
//! Raw sensor readings only ever reach the fusion layer as debounced
//! [`DetectionEvent`]s. Nothing in this module performs camera or file I/O;
//! the weight sampler is the only part that awaits a sensor.

mod capture;
mod debouncer;
mod differencer;
mod frame;
mod presence;
mod weight;

pub use capture::{CaptureGate, CaptureRecord, DetectionType};
pub use debouncer::MotionDebouncer;
pub use differencer::{FrameDifferencer, MotionScore};
pub use frame::Frame;
pub use presence::{DetectionEvent, DetectionMode, PresenceMachine, PresenceState, Transition};
pub use weight::{WeightSample, WeightSampler};
