//! Local photo storage.

mod metadata;
mod writer;

pub use metadata::CaptureMetadata;
pub use writer::{CaptureStore, StoredCapture, encode_jpeg};
