//! Background upload worker.

use super::{UploadClient, Uploader};
use crate::config::UploadConfig;
use crate::error::Result;
use crate::storage::StoredCapture;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, info, warn};

/// Outcome counts of a worker's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadStats {
    /// Photos accepted by the service.
    pub succeeded: usize,
    /// Photos that failed or were rejected.
    pub failed: usize,
}

impl UploadStats {
    fn record(&mut self, outcome: std::result::Result<bool, JoinError>) {
        match outcome {
            Ok(true) => self.succeeded += 1,
            Ok(false) => self.failed += 1,
            Err(e) => {
                warn!("Upload task aborted: {e}");
                self.failed += 1;
            }
        }
    }
}

/// Uploads captures over HTTP from a background task.
///
/// Must be created inside a tokio runtime.
#[derive(Debug)]
pub struct HttpUploader {
    queue: mpsc::Sender<StoredCapture>,
    worker: JoinHandle<UploadStats>,
}

impl HttpUploader {
    /// Start a worker for the configured service.
    pub fn start(config: &UploadConfig) -> Result<Self> {
        info!("Uploading photos to {}", config.service_url);
        Ok(Self::with_client(
            UploadClient::from_config(config)?,
            config.max_concurrent,
            config.queue_capacity,
        ))
    }

    /// Start a worker allowing `max_concurrent` requests in flight and
    /// `queue_capacity` captures waiting behind them.
    pub fn with_client(client: UploadClient, max_concurrent: usize, queue_capacity: usize) -> Self {
        let (queue, pending) = mpsc::channel(queue_capacity.max(1));
        let worker = tokio::spawn(dispatch(client, pending, max_concurrent.max(1)));
        Self { queue, worker }
    }

    /// Stop accepting captures and wait up to `grace` for queued and
    /// in-flight uploads. Returns `None` if the grace period ran out.
    pub async fn drain(mut self, grace: Duration) -> Option<UploadStats> {
        drop(self.queue);
        match tokio::time::timeout(grace, &mut self.worker).await {
            Ok(Ok(stats)) => {
                info!(
                    "Uploads finished: {} succeeded, {} failed",
                    stats.succeeded, stats.failed
                );
                Some(stats)
            }
            Ok(Err(e)) => {
                warn!("Upload worker failed: {e}");
                None
            }
            Err(_) => {
                warn!(
                    "Abandoning pending uploads after {:.1}s; photos remain on disk",
                    grace.as_secs_f64()
                );
                self.worker.abort();
                None
            }
        }
    }
}

impl Uploader for HttpUploader {
    fn submit(&self, capture: StoredCapture) {
        match self.queue.try_send(capture) {
            Ok(()) => {}
            Err(TrySendError::Full(capture)) => warn!(
                "Upload queue full; {} stays local",
                capture.image_path.display()
            ),
            Err(TrySendError::Closed(capture)) => warn!(
                "Upload worker stopped; {} stays local",
                capture.image_path.display()
            ),
        }
    }
}

async fn dispatch(
    client: UploadClient,
    mut pending: mpsc::Receiver<StoredCapture>,
    max_concurrent: usize,
) -> UploadStats {
    let mut in_flight = JoinSet::new();
    let mut stats = UploadStats::default();

    loop {
        tokio::select! {
            Some(done) = in_flight.join_next(), if !in_flight.is_empty() => stats.record(done),
            next = pending.recv(), if in_flight.len() < max_concurrent => {
                let Some(capture) = next else { break };
                let client = client.clone();
                in_flight.spawn(upload_one(client, capture));
            }
        }
    }

    while let Some(done) = in_flight.join_next().await {
        stats.record(done);
    }
    stats
}

async fn upload_one(client: UploadClient, capture: StoredCapture) -> bool {
    let name = capture.metadata.filename.clone();
    debug!("Uploading {name} to {}", client.url());
    match client.upload(capture).await {
        Ok(url) => {
            info!("Uploaded {name}: {url}");
            true
        }
        Err(e) => {
            warn!("Upload of {name} failed: {e}");
            false
        }
    }
}
