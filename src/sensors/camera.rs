//! Camera capture.
//!
//! The camera runs as one long-lived process streaming MJPEG to stdout. A
//! background task splits the stream into frames and keeps the newest one;
//! [`Camera::capture`] waits for the next frame, much like reading from a
//! video capture device.

use crate::config::{CameraConfig, seconds};
use crate::error::{Error, Result};
use image::DynamicImage;
use std::future::Future;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Start of image marker.
const SOI: [u8; 2] = [0xFF, 0xD8];
/// End of image marker.
const EOI: [u8; 2] = [0xFF, 0xD9];
/// A partial frame larger than this is dropped as garbage.
const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;
/// Read size for the stream pump.
const READ_CHUNK: usize = 64 * 1024;

/// A source of still images.
pub trait Camera {
    /// Capture one image.
    fn capture(&mut self) -> impl Future<Output = Result<DynamicImage>>;

    /// Discard `frames` images so auto-exposure can settle.
    fn warmup(&mut self, frames: u32) -> impl Future<Output = ()> {
        async move {
            for index in 0..frames {
                if let Err(e) = self.capture().await {
                    debug!("Warm-up frame {} failed: {e}", index + 1);
                }
            }
        }
    }
}

/// Splits a byte stream of concatenated JPEGs into whole frames.
#[derive(Debug, Default)]
pub struct JpegSplitter {
    buffer: Vec<u8>,
}

impl JpegSplitter {
    /// Feed bytes; returns every frame completed by them, oldest first.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(bytes);
        let mut frames = Vec::new();

        loop {
            let Some(start) = find(&self.buffer, &SOI, 0) else {
                // Keep a trailing 0xFF in case it starts the next marker.
                let keep = usize::from(self.buffer.last() == Some(&0xFF));
                self.buffer.drain(..self.buffer.len() - keep);
                break;
            };
            let Some(end) = find(&self.buffer, &EOI, start + SOI.len()) else {
                self.buffer.drain(..start);
                if self.buffer.len() > MAX_FRAME_BYTES {
                    warn!("Dropping {} bytes without an end of image marker", self.buffer.len());
                    self.buffer.clear();
                }
                break;
            };
            let end = end + EOI.len();
            frames.push(self.buffer[start..end].to_vec());
            self.buffer.drain(..end);
        }

        frames
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| from + offset)
}

struct Stream {
    // Held so the process is killed when the stream is dropped.
    _child: Child,
    frames: watch::Receiver<Vec<u8>>,
    pump: JoinHandle<()>,
}

impl Drop for Stream {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

/// Reads frames from a long-running program that writes MJPEG to stdout,
/// such as `rpicam-vid --codec mjpeg -o -`.
///
/// The program is started on the first capture and restarted on the next
/// capture after it exits.
pub struct StreamCamera {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    stream: Option<Stream>,
}

impl std::fmt::Debug for StreamCamera {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamCamera")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("timeout", &self.timeout)
            .field("streaming", &self.stream.is_some())
            .finish()
    }
}

impl StreamCamera {
    /// Create a camera from configuration. Nothing is started yet.
    pub fn from_config(config: &CameraConfig) -> Result<Self> {
        info!("Camera command: {} {}", config.command, config.args.join(" "));
        Ok(Self {
            program: config.command.clone(),
            args: config.args.clone(),
            timeout: seconds("camera.timeout_secs", config.timeout_secs)?,
            stream: None,
        })
    }

    fn start(&self) -> Result<Stream> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::CameraUnavailable {
                reason: format!("failed to run '{}': {e}", self.program),
            })?;
        let stdout = child.stdout.take().ok_or_else(|| Error::CameraUnavailable {
            reason: format!("'{}' has no stdout", self.program),
        })?;

        let (tx, frames) = watch::channel(Vec::new());
        let pump = tokio::spawn(pump_frames(stdout, tx));
        debug!("Started camera stream '{}'", self.program);

        Ok(Stream {
            _child: child,
            frames,
            pump,
        })
    }

    /// Wait for the next frame, `None` once the stream has ended.
    async fn next_frame(&mut self) -> Result<Option<Vec<u8>>> {
        let stream = match self.stream.take() {
            Some(stream) => stream,
            None => self.start()?,
        };
        let stream = self.stream.insert(stream);

        match tokio::time::timeout(self.timeout, stream.frames.changed()).await {
            Ok(Ok(())) => Ok(Some(stream.frames.borrow_and_update().clone())),
            Ok(Err(_)) => Ok(None),
            Err(_) => Err(Error::CameraTimeout {
                timeout_secs: self.timeout.as_secs_f64(),
            }),
        }
    }
}

async fn pump_frames(mut stdout: ChildStdout, frames: watch::Sender<Vec<u8>>) {
    let mut splitter = JpegSplitter::default();
    let mut chunk = vec![0; READ_CHUNK];

    loop {
        match stdout.read(&mut chunk).await {
            Ok(0) => break,
            Ok(read) => {
                for frame in splitter.push(&chunk[..read]) {
                    frames.send_replace(frame);
                }
                if frames.is_closed() {
                    break;
                }
            }
            Err(e) => {
                warn!("Camera stream read failed: {e}");
                break;
            }
        }
    }
    debug!("Camera stream ended");
}

impl Camera for StreamCamera {
    async fn capture(&mut self) -> Result<DynamicImage> {
        let Some(bytes) = self.next_frame().await? else {
            self.stream = None;
            return Err(Error::CameraUnavailable {
                reason: format!("'{}' stopped streaming", self.program),
            });
        };
        image::load_from_memory(&bytes).map_err(|source| Error::ImageDecode { source })
    }
}
