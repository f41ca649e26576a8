//! Periodic detection loop.
//!
//! Each tick reads the enabled sensors, turns readings into debounced events,
//! feeds them to the presence machine and captures a photo on arrival. Only
//! fatal errors leave [`Monitor::tick`]; sensor and capture failures are
//! logged and the next tick runs as usual.

use super::MonitorSettings;
use crate::detection::{
    CaptureGate, CaptureRecord, DetectionEvent, DetectionMode, DetectionType, Frame,
    FrameDifferencer, MotionDebouncer, MotionScore, PresenceMachine, PresenceState, Transition,
    WeightSample, WeightSampler,
};
use crate::error::{Error, Result};
use crate::sensors::{Camera, WeightSource};
use crate::storage::{CaptureStore, encode_jpeg};
use crate::upload::Uploader;
use chrono::Local;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// What happened to the photo of an arrival.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    /// The photo was stored and handed to the uploader.
    Stored {
        /// Final photo path.
        image_path: PathBuf,
    },
    /// The cooldown had not elapsed.
    Suppressed {
        /// Time left in the cooldown.
        remaining: Duration,
    },
    /// The camera or the disk failed; the cooldown was not started.
    Failed {
        /// Error message.
        reason: String,
    },
}

/// Result of one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Motion score, absent on the first frame or when the camera failed.
    pub score: Option<MotionScore>,
    /// Debounced events raised this tick, in the order applied.
    pub events: Vec<DetectionEvent>,
    /// Presence edge taken this tick.
    pub transition: Option<Transition>,
    /// Photo outcome of an arrival.
    pub capture: Option<CaptureOutcome>,
}

/// Counters over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Ticks executed.
    pub ticks: u64,
    /// `Idle -> BirdPresent` transitions.
    pub arrivals: u64,
    /// `BirdPresent -> Idle` transitions.
    pub departures: u64,
    /// Photos stored.
    pub photos: u64,
    /// Arrivals inside the cooldown.
    pub suppressed: u64,
    /// Photos that could not be taken or stored.
    pub capture_failures: u64,
    /// Sensor reads that produced no signal.
    pub sensor_errors: u64,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ticks, {} visits, {} photos ({} suppressed, {} failed), {} sensor errors",
            self.ticks,
            self.arrivals,
            self.photos,
            self.suppressed,
            self.capture_failures,
            self.sensor_errors
        )
    }
}

/// Owns the sensors and all detection state.
///
/// Presence state is only ever written from [`Monitor::tick`].
#[derive(Debug)]
pub struct Monitor<C, W, U> {
    settings: MonitorSettings,
    camera: C,
    scale: Option<W>,
    uploader: U,
    store: CaptureStore,
    differencer: FrameDifferencer,
    debouncer: MotionDebouncer,
    sampler: WeightSampler,
    presence: PresenceMachine,
    gate: CaptureGate,
    summary: RunSummary,
    warmed_up: bool,
}

impl<C: Camera, W: WeightSource, U: Uploader> Monitor<C, W, U> {
    /// Assemble a monitor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigValidation`] if the mode reads weight but no
    /// scale was given.
    pub fn new(
        settings: MonitorSettings,
        camera: C,
        scale: Option<W>,
        uploader: U,
        store: CaptureStore,
    ) -> Result<Self> {
        if settings.mode.uses_weight() && scale.is_none() {
            return Err(Error::ConfigValidation {
                message: format!("{} detection needs a connected scale", settings.mode),
            });
        }

        Ok(Self {
            differencer: FrameDifferencer::new(settings.score_mode, settings.pixel_delta),
            debouncer: MotionDebouncer::new(
                settings.motion_threshold,
                settings.frames_before_departure,
            ),
            sampler: WeightSampler::new(
                settings.weight_threshold_grams,
                settings.scale_wait,
                settings.sensor_check_interval,
            ),
            presence: PresenceMachine::new(settings.mode),
            gate: CaptureGate::new(settings.photo_cooldown),
            summary: RunSummary::default(),
            warmed_up: false,
            settings,
            camera,
            scale,
            uploader,
            store,
        })
    }

    /// Current presence state.
    pub fn state(&self) -> PresenceState {
        self.presence.state()
    }

    /// Counters so far.
    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    /// Give back the uploader, e.g. to drain it.
    pub fn into_uploader(self) -> U {
        self.uploader
    }

    /// Discard the configured warm-up frames. Runs once per monitor, in
    /// every mode, since weight-only visits still photograph.
    pub async fn warm_up(&mut self) {
        if self.warmed_up {
            return;
        }
        self.warmed_up = true;
        let frames = self.settings.camera_warmup_frames;
        if frames > 0 {
            info!("Warming up camera ({frames} frames)...");
            self.camera.warmup(frames).await;
        }
    }

    /// Run one detection cycle.
    ///
    /// # Errors
    ///
    /// Only errors that must stop the loop are returned, such as a change
    /// of camera frame size.
    pub async fn tick(&mut self) -> Result<TickReport> {
        self.summary.ticks += 1;
        let mut report = TickReport::default();

        if self.settings.mode.uses_motion() {
            self.poll_motion(&mut report).await?;
        }

        let confirmed = match self.settings.mode {
            DetectionMode::MotionOnly => None,
            DetectionMode::MotionAndWeight => {
                let arriving = self.presence.state() == PresenceState::Idle
                    && report.events.contains(&DetectionEvent::MotionDetected);
                if arriving {
                    self.confirm_weight(&mut report).await
                } else {
                    None
                }
            }
            DetectionMode::WeightOnly => match self.presence.state() {
                PresenceState::Idle => self.confirm_weight(&mut report).await,
                PresenceState::BirdPresent => {
                    self.check_weight_cleared(&mut report).await;
                    None
                }
            },
        };

        for event in report.events.clone() {
            let Some(transition) = self.presence.apply(event) else {
                continue;
            };
            report.transition = Some(transition);
            match transition {
                Transition::Arrived => {
                    report.capture = Some(self.on_arrival(confirmed).await);
                }
                Transition::Departed => self.on_departure().await,
            }
        }

        Ok(report)
    }

    /// Tick until `shutdown` turns true, then return the run's counters.
    ///
    /// Shutdown is only observed between ticks.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error raised by a tick.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<RunSummary> {
        info!(
            "Monitoring ({}), checking every {}ms",
            self.settings.mode,
            self.settings.sensor_check_interval.as_millis()
        );
        self.warm_up().await;

        let mut ticker = tokio::time::interval(self.settings.sensor_check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        debug!("Shutdown sender dropped");
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            if let Err(e) = self.tick().await {
                warn!("Stopping detection loop: {e}");
                return Err(e);
            }
        }

        info!("Stopped: {}", self.summary);
        Ok(self.summary)
    }

    async fn poll_motion(&mut self, report: &mut TickReport) -> Result<()> {
        let image = match self.camera.capture().await {
            Ok(image) => image,
            Err(e) => {
                self.summary.sensor_errors += 1;
                warn!("Camera read failed: {e}");
                return Ok(());
            }
        };

        report.score = self.differencer.score(Frame::from_image(&image))?;
        if let Some(score) = report.score
            && let Some(event) = self.debouncer.observe(score)
        {
            debug!("Motion score {score}: {event}");
            report.events.push(event);
        }
        Ok(())
    }

    /// Settle-wait on the scale; a confirmed sample is attached to this
    /// visit's photo.
    async fn confirm_weight(&mut self, report: &mut TickReport) -> Option<WeightSample> {
        let scale = self.scale.as_mut()?;
        let sample = self.sampler.settle_wait(scale).await?;
        if let Some(event) = self.sampler.confirm(&sample) {
            info!("Weight detected: {:.2}g", sample.grams().unwrap_or_default());
            report.events.push(event);
        }
        Some(sample)
    }

    async fn check_weight_cleared(&mut self, report: &mut TickReport) {
        let Some(scale) = self.scale.as_mut() else {
            return;
        };
        let reading = scale.read().await;
        if let Err(e) = &reading {
            self.summary.sensor_errors += 1;
            debug!("Scale read failed: {e}");
        }
        if let Some(event) = self.sampler.observe(&reading) {
            report.events.push(event);
        }
    }

    async fn on_arrival(&mut self, confirmed: Option<WeightSample>) -> CaptureOutcome {
        self.summary.arrivals += 1;
        info!("Bird arrived");

        let now = Instant::now();
        if let Some(remaining) = self.gate.remaining(now) {
            self.summary.suppressed += 1;
            info!(
                "Photo suppressed, cooldown has {:.1}s left",
                remaining.as_secs_f64()
            );
            return CaptureOutcome::Suppressed { remaining };
        }

        let weight_grams = confirmed.and_then(|sample| sample.grams());
        let detection = match (self.settings.mode, weight_grams) {
            (DetectionMode::WeightOnly, _) => DetectionType::Weight,
            (DetectionMode::MotionAndWeight, Some(_)) => DetectionType::Both,
            _ => DetectionType::Motion,
        };

        match self.take_photo(weight_grams, detection).await {
            Ok(image_path) => {
                self.gate.record_capture(now);
                self.summary.photos += 1;
                CaptureOutcome::Stored { image_path }
            }
            Err(e) => {
                self.summary.capture_failures += 1;
                warn!("Photo capture failed: {e}");
                CaptureOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn take_photo(
        &mut self,
        weight_grams: Option<f64>,
        detection: DetectionType,
    ) -> Result<PathBuf> {
        let image = self.camera.capture().await?;
        let record = CaptureRecord {
            image: encode_jpeg(&image, self.settings.jpeg_quality)?,
            weight_grams,
            captured_at: Local::now(),
            detection,
        };
        let stored = self.store.persist(record).await?;
        info!("Photo saved: {}", stored.image_path.display());

        let image_path = stored.image_path.clone();
        self.uploader.submit(stored);
        Ok(image_path)
    }

    async fn on_departure(&mut self) {
        self.summary.departures += 1;
        info!("Bird left");
        self.sampler.reset();

        if !self.settings.tare_on_departure {
            return;
        }
        if let Some(scale) = self.scale.as_mut() {
            match scale.tare().await {
                Ok(()) => debug!("Scale re-tared"),
                Err(e) => warn!("Re-tare after departure failed: {e}"),
            }
        }
    }
}
