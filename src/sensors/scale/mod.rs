//! Weight backends.
//!
//! Presence logic only sees [`WeightSource`]; which backend is attached is
//! decided once at startup by [`ScaleBackend::connect`].

mod direct;
mod serial;

pub use direct::{DirectScale, stable_reading};
pub use serial::{PicoMessage, SerialScale};

use crate::config::{ScaleBackendKind, ScaleConfig};
use crate::detection::WeightSample;
use crate::error::Result;
use std::future::Future;
use tracing::info;

/// Something that reports a weight in grams.
pub trait WeightSource {
    /// Read the current weight.
    ///
    /// Returns an invalid sample when the sensor answered without a value and
    /// an error when it could not be read at all.
    fn read(&mut self) -> impl Future<Output = Result<WeightSample>>;

    /// Treat the current load as zero.
    fn tare(&mut self) -> impl Future<Output = Result<()>>;
}

/// The configured weight backend.
#[derive(Debug)]
pub enum ScaleBackend {
    /// Pico over USB serial.
    Serial(SerialScale),
    /// HX711 read on this host.
    Direct(DirectScale),
}

impl ScaleBackend {
    /// Open the backend selected in `config`.
    ///
    /// The direct backend is tared on connect; the Pico keeps its own
    /// calibrated tare across restarts.
    pub async fn connect(config: &ScaleConfig) -> Result<Self> {
        info!("Initializing {} weight sensor...", config.backend);
        match config.backend {
            ScaleBackendKind::Serial => Ok(Self::Serial(SerialScale::open(&config.serial).await?)),
            ScaleBackendKind::Direct => {
                let mut scale = DirectScale::from_config(&config.direct);
                scale.tare().await?;
                info!("Scale tared, waiting for birds...");
                Ok(Self::Direct(scale))
            }
        }
    }
}

impl WeightSource for ScaleBackend {
    async fn read(&mut self) -> Result<WeightSample> {
        match self {
            Self::Serial(scale) => scale.read().await,
            Self::Direct(scale) => scale.read().await,
        }
    }

    async fn tare(&mut self) -> Result<()> {
        match self {
            Self::Serial(scale) => scale.tare().await,
            Self::Direct(scale) => scale.tare().await,
        }
    }
}
