//! Cloud upload of stored photos.
//!
//! Uploads never block the detection loop: captures are queued and sent by a
//! background worker with bounded concurrency. Failures are logged and the
//! photo stays on disk; there is no retry.

mod client;
mod worker;

pub use client::{UploadClient, UploadResponse, UploadUrls};
pub use worker::{HttpUploader, UploadStats};

use crate::storage::StoredCapture;

/// Receives stored captures for upload.
pub trait Uploader {
    /// Hand a capture over. Must return without waiting on the network.
    fn submit(&self, capture: StoredCapture);
}

/// A disabled uploader drops captures silently.
impl<U: Uploader> Uploader for Option<U> {
    fn submit(&self, capture: StoredCapture) {
        if let Some(uploader) = self {
            uploader.submit(capture);
        }
    }
}
