//! Pico weight reporter over USB serial.
//!
//! The Pico streams `WEIGHT:<grams>` lines every ~200ms. A background task
//! keeps the latest report; [`SerialScale::read`] returns it while it is fresh.
//!
//! A tty cannot seek, so the device is read and written through two separate
//! handles. Reads block on a dedicated thread that feeds lines into a channel.

use crate::config::{SerialScaleConfig, seconds};
use crate::constants::pico;
use crate::detection::WeightSample;
use crate::error::{Error, Result};
use crate::sensors::WeightSource;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// One line received from the Pico.
#[derive(Debug, Clone, PartialEq)]
pub enum PicoMessage {
    /// Device initialised.
    Ready,
    /// Weight report in grams.
    Weight(f64),
    /// Error report with its code.
    Error(String),
    /// Tare started.
    Taring,
    /// Tare finished.
    Tared,
    /// Reply to a ping.
    Pong,
    /// Anything else, such as boot noise.
    Other(String),
}

impl PicoMessage {
    /// Parse one protocol line.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if let Some(value) = line.strip_prefix(pico::WEIGHT_PREFIX) {
            return value
                .trim()
                .parse()
                .map_or_else(|_| Self::Other(line.to_string()), Self::Weight);
        }
        if let Some(code) = line.strip_prefix(pico::ERROR_PREFIX) {
            return Self::Error(code.trim().to_string());
        }
        match line {
            pico::READY => Self::Ready,
            pico::TARING => Self::Taring,
            pico::TARED => Self::Tared,
            pico::PONG => Self::Pong,
            other => Self::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Reading {
    sample: WeightSample,
    received: Instant,
}

type SerialWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Weight reported by a Pico over a serial line.
pub struct SerialScale {
    port: PathBuf,
    writer: SerialWriter,
    latest: watch::Receiver<Option<Reading>>,
    tare_result: watch::Receiver<Option<bool>>,
    timeout: Duration,
    tare_timeout: Duration,
    reader: JoinHandle<()>,
}

impl std::fmt::Debug for SerialScale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialScale")
            .field("port", &self.port)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Lines buffered between the device reader and the scale.
const LINE_BUFFER: usize = 64;

impl SerialScale {
    /// Open the configured serial device and wait for the Pico.
    ///
    /// USB CDC ignores the line rate, so the device is opened as a plain file.
    pub async fn open(config: &SerialScaleConfig) -> Result<Self> {
        info!("Connecting to Pico on {}...", config.port.display());
        let connect_error = |e: std::io::Error| Error::ScaleConnect {
            port: config.port.clone(),
            reason: e.to_string(),
        };

        let device = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(&config.port)
            .map_err(connect_error)?;
        let writer = device.try_clone().map_err(connect_error)?;
        let lines = read_lines_on_thread(device, &config.port).map_err(connect_error)?;

        Self::attach(lines, tokio::fs::File::from_std(writer), config).await
    }

    /// Attach to an already open async stream and wait for `READY`.
    pub async fn connect<R, W>(reader: R, writer: W, config: &SerialScaleConfig) -> Result<Self>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (tx, lines) = mpsc::channel(LINE_BUFFER);
        tokio::spawn(async move {
            let mut source = BufReader::new(reader).lines();
            loop {
                match source.next_line().await {
                    Ok(Some(line)) => {
                        if tx.send(line).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Serial read error: {e}");
                        break;
                    }
                }
            }
        });
        Self::attach(lines, writer, config).await
    }

    async fn attach<W>(
        mut lines: mpsc::Receiver<String>,
        writer: W,
        config: &SerialScaleConfig,
    ) -> Result<Self>
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let connect_error = |reason: String| Error::ScaleConnect {
            port: config.port.clone(),
            reason,
        };
        let ready_timeout = seconds("scale.serial.ready_timeout_secs", config.ready_timeout_secs)?;
        let timeout = seconds("scale.serial.timeout_secs", config.timeout_secs)?;

        let ready = tokio::time::timeout(ready_timeout, async {
            while let Some(line) = lines.recv().await {
                match PicoMessage::parse(&line) {
                    PicoMessage::Ready => return true,
                    other => debug!("Ignoring startup line: {other:?}"),
                }
            }
            false
        })
        .await;

        match ready {
            Ok(true) => {}
            Ok(false) => return Err(connect_error("device closed before READY".to_string())),
            Err(_) => {
                return Err(connect_error(format!(
                    "no READY within {:.1}s",
                    ready_timeout.as_secs_f64()
                )));
            }
        }
        info!("Pico weight sensor ready");

        let (latest_tx, latest) = watch::channel(None);
        let (tare_tx, tare_result) = watch::channel(None);

        let reader = tokio::spawn(async move {
            while let Some(line) = lines.recv().await {
                handle_line(&line, &latest_tx, &tare_tx);
            }
            warn!("Pico serial connection closed");
        });

        Ok(Self {
            port: config.port.clone(),
            writer: Box::new(writer),
            latest,
            tare_result,
            timeout,
            tare_timeout: ready_timeout,
            reader,
        })
    }

    async fn send(&mut self, command: &[u8]) -> Result<()> {
        let written = async {
            self.writer.write_all(command).await?;
            self.writer.flush().await
        };
        written.await.map_err(|e| Error::SensorRead {
            reason: format!("failed to write to {}: {e}", self.port.display()),
        })
    }
}

/// Read lines from `device` on a dedicated thread until the receiver goes
/// away or the device fails.
fn read_lines_on_thread(
    device: std::fs::File,
    port: &Path,
) -> std::io::Result<mpsc::Receiver<String>> {
    let (tx, rx) = mpsc::channel(LINE_BUFFER);
    let port = port.display().to_string();
    std::thread::Builder::new()
        .name("pico-serial".to_string())
        .spawn(move || {
            for line in std::io::BufReader::new(device).lines() {
                match line {
                    Ok(line) => {
                        if tx.blocking_send(line).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        warn!("Serial read error on {port}: {e}");
                        return;
                    }
                }
            }
        })?;
    Ok(rx)
}

fn handle_line(
    line: &str,
    latest: &watch::Sender<Option<Reading>>,
    tare: &watch::Sender<Option<bool>>,
) {
    let publish = |sample| {
        latest.send_replace(Some(Reading {
            sample,
            received: Instant::now(),
        }));
    };

    match PicoMessage::parse(line) {
        PicoMessage::Weight(grams) => publish(WeightSample::new(grams)),
        PicoMessage::Error(code) if code == pico::NO_READING => publish(WeightSample::invalid()),
        PicoMessage::Error(code) if code.starts_with("TARE") => {
            warn!("Pico error: {code}");
            tare.send_replace(Some(false));
        }
        PicoMessage::Error(code) => warn!("Pico error: {code}"),
        PicoMessage::Taring => info!("Pico: taring scale..."),
        PicoMessage::Tared => {
            info!("Pico: scale tared");
            tare.send_replace(Some(true));
        }
        PicoMessage::Pong | PicoMessage::Ready => debug!("Pico: {line}"),
        PicoMessage::Other(text) => debug!("Ignoring serial line: {text}"),
    }
}

impl WeightSource for SerialScale {
    async fn read(&mut self) -> Result<WeightSample> {
        if self.reader.is_finished() {
            return Err(Error::SensorRead {
                reason: format!("serial connection {} closed", self.port.display()),
            });
        }

        match *self.latest.borrow() {
            Some(reading) if reading.received.elapsed() <= self.timeout => Ok(reading.sample),
            _ => Err(Error::SensorTimeout {
                timeout_secs: self.timeout.as_secs_f64(),
            }),
        }
    }

    async fn tare(&mut self) -> Result<()> {
        self.tare_result.mark_unchanged();
        self.send(pico::TARE_COMMAND).await?;

        let changed = tokio::time::timeout(self.tare_timeout, self.tare_result.changed()).await;
        match changed {
            Ok(Ok(())) if *self.tare_result.borrow() == Some(true) => Ok(()),
            Ok(Ok(())) => Err(Error::SensorRead {
                reason: "Pico reported tare failure".to_string(),
            }),
            Ok(Err(_)) => Err(Error::SensorRead {
                reason: format!("serial connection {} closed", self.port.display()),
            }),
            Err(_) => Err(Error::SensorTimeout {
                timeout_secs: self.tare_timeout.as_secs_f64(),
            }),
        }
    }
}

impl Drop for SerialScale {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf};

    #[test]
    fn test_parse_protocol_lines() {
        assert_eq!(PicoMessage::parse("READY\r\n"), PicoMessage::Ready);
        assert_eq!(PicoMessage::parse("WEIGHT:12.34"), PicoMessage::Weight(12.34));
        assert_eq!(PicoMessage::parse("WEIGHT:-0.50"), PicoMessage::Weight(-0.5));
        assert_eq!(
            PicoMessage::parse("ERROR:NO_READING"),
            PicoMessage::Error("NO_READING".to_string())
        );
        assert_eq!(PicoMessage::parse("TARED"), PicoMessage::Tared);
        assert_eq!(
            PicoMessage::parse("WEIGHT:abc"),
            PicoMessage::Other("WEIGHT:abc".to_string())
        );
    }

    struct Device {
        lines: tokio::io::Lines<BufReader<ReadHalf<DuplexStream>>>,
        writer: WriteHalf<DuplexStream>,
    }

    impl Device {
        async fn say(&mut self, line: &str) {
            self.writer.write_all(format!("{line}\n").as_bytes()).await.unwrap();
        }
    }

    fn config() -> SerialScaleConfig {
        SerialScaleConfig {
            port: PathBuf::from("/dev/ttyTEST"),
            timeout_secs: 2.0,
            ready_timeout_secs: 1.0,
        }
    }

    async fn connected() -> (SerialScale, Device) {
        let (host, device) = tokio::io::duplex(1024);
        let (host_read, host_write) = tokio::io::split(host);
        let (device_read, device_write) = tokio::io::split(device);
        let mut device = Device {
            lines: BufReader::new(device_read).lines(),
            writer: device_write,
        };
        device.say("MicroPython boot").await;
        device.say("READY").await;
        let scale = SerialScale::connect(host_read, host_write, &config())
            .await
            .unwrap();
        (scale, device)
    }

    async fn next_reading(scale: &mut SerialScale) -> Result<WeightSample> {
        for _ in 0..100 {
            if let Ok(sample) = scale.read().await {
                return Ok(sample);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        scale.read().await
    }

    #[tokio::test]
    async fn test_reports_latest_weight() {
        let (mut scale, mut device) = connected().await;
        assert!(matches!(
            scale.read().await,
            Err(Error::SensorTimeout { .. })
        ));

        device.say("WEIGHT:6.25").await;
        let sample = next_reading(&mut scale).await.unwrap();
        assert_eq!(sample.grams(), Some(6.25));
    }

    #[tokio::test]
    async fn test_no_reading_is_invalid_sample() {
        let (mut scale, mut device) = connected().await;
        device.say("ERROR:NO_READING").await;
        let sample = next_reading(&mut scale).await.unwrap();
        assert!(!sample.is_valid());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_reading_times_out() {
        let (mut scale, mut device) = connected().await;
        device.say("WEIGHT:8.00").await;
        next_reading(&mut scale).await.unwrap();

        tokio::time::advance(Duration::from_secs(3)).await;
        assert!(matches!(
            scale.read().await,
            Err(Error::SensorTimeout { .. })
        ));
    }

    #[tokio::test]
    async fn test_tare_round_trip() {
        let (mut scale, mut device) = connected().await;
        let pico = tokio::spawn(async move {
            let command = device.lines.next_line().await.unwrap();
            device.say("TARING").await;
            device.say("TARED").await;
            (command, device)
        });

        scale.tare().await.unwrap();
        let (command, _device) = pico.await.unwrap();
        assert_eq!(command.as_deref(), Some("TARE"));
    }

    #[tokio::test]
    async fn test_tare_failure_reported() {
        let (mut scale, mut device) = connected().await;
        let pico = tokio::spawn(async move {
            device.lines.next_line().await.unwrap();
            device.say("ERROR:TARE_FAILED").await;
            device
        });

        assert!(scale.tare().await.is_err());
        drop(pico.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_ready_fails_to_connect() {
        let (host, _device) = tokio::io::duplex(64);
        let (host_read, host_write) = tokio::io::split(host);
        let err = SerialScale::connect(host_read, host_write, &config())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ScaleConnect { .. }));
    }

    /// A FIFO stands in for the tty: both refuse to seek.
    #[cfg(unix)]
    #[tokio::test]
    async fn test_tare_through_unseekable_device() {
        let dir = tempfile::TempDir::new().unwrap();
        let port = dir.path().join("ttyPICO");
        let status = std::process::Command::new("mkfifo")
            .arg(&port)
            .status()
            .unwrap();
        assert!(status.success());

        let device_port = port.clone();
        std::thread::spawn(move || {
            use std::io::Write;
            let mut device = std::fs::OpenOptions::new()
                .write(true)
                .open(&device_port)
                .unwrap();
            let mut report = |line: &str| writeln!(device, "{line}").and_then(|()| device.flush());
            if report("READY").is_err() {
                return;
            }
            for _ in 0..100 {
                if report("WEIGHT:1.00").is_err() || report("TARED").is_err() {
                    return;
                }
                std::thread::sleep(Duration::from_millis(50));
            }
        });

        let mut scale = SerialScale::open(&SerialScaleConfig {
            port,
            timeout_secs: 2.0,
            ready_timeout_secs: 2.0,
        })
        .await
        .unwrap();

        for _ in 0..3 {
            scale.tare().await.unwrap();
        }
        let sample = next_reading(&mut scale).await.unwrap();
        assert_eq!(sample.grams(), Some(1.0));
    }

    #[tokio::test]
    async fn test_missing_device_fails_to_connect() {
        let err = SerialScale::open(&SerialScaleConfig {
            port: PathBuf::from("/nonexistent/ttyACM9"),
            timeout_secs: 2.0,
            ready_timeout_secs: 1.0,
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::ScaleConnect { .. }));
    }
}
