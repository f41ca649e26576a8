//! CLI argument parsing and command handling.

mod args;
mod validators;

pub use args::{CalibrateArgs, Cli, Command, ConfigAction, DetectionArgs};
