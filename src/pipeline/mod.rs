//! The detection loop: sensors in, photos out.

mod monitor;
mod settings;

pub use monitor::{CaptureOutcome, Monitor, RunSummary, TickReport};
pub use settings::MonitorSettings;
