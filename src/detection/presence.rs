//! Presence state machine.
//!
//! Fuses the debounced motion and weight signals into bird arrival and
//! departure. The machine holds no timers; it is a pure function of its
//! current state and the next event.

/// Debounced boolean-level signal emitted by a sensor branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionEvent {
    /// Motion became present.
    MotionDetected,
    /// Motion stopped for long enough.
    MotionCleared,
    /// A reading above the weight threshold confirmed a bird.
    WeightDetected,
    /// The weight dropped back or the reading became invalid.
    WeightCleared,
}

impl std::fmt::Display for DetectionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MotionDetected => write!(f, "motion detected"),
            Self::MotionCleared => write!(f, "motion cleared"),
            Self::WeightDetected => write!(f, "weight detected"),
            Self::WeightCleared => write!(f, "weight cleared"),
        }
    }
}

/// Which sensors drive presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionMode {
    /// Camera motion only.
    MotionOnly,
    /// Scale only.
    WeightOnly,
    /// Motion drives presence; weight is attached as corroborating metadata.
    MotionAndWeight,
}

impl DetectionMode {
    /// Whether the camera is polled for motion each tick.
    pub const fn uses_motion(self) -> bool {
        matches!(self, Self::MotionOnly | Self::MotionAndWeight)
    }

    /// Whether the scale is read.
    pub const fn uses_weight(self) -> bool {
        matches!(self, Self::WeightOnly | Self::MotionAndWeight)
    }
}

impl std::fmt::Display for DetectionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MotionOnly => write!(f, "motion only"),
            Self::WeightOnly => write!(f, "weight only"),
            Self::MotionAndWeight => write!(f, "motion + weight"),
        }
    }
}

/// Whether a bird is on the feeder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PresenceState {
    /// No bird.
    #[default]
    Idle,
    /// A bird is visiting.
    BirdPresent,
}

/// An edge taken by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// `Idle -> BirdPresent`.
    Arrived,
    /// `BirdPresent -> Idle`.
    Departed,
}

/// Owns the presence state; the only writer of it.
#[derive(Debug, Clone)]
pub struct PresenceMachine {
    mode: DetectionMode,
    state: PresenceState,
}

impl PresenceMachine {
    /// Create an idle machine for `mode`.
    pub fn new(mode: DetectionMode) -> Self {
        Self {
            mode,
            state: PresenceState::Idle,
        }
    }

    /// Current state.
    pub fn state(&self) -> PresenceState {
        self.state
    }

    /// Detection mode the machine was built for.
    pub fn mode(&self) -> DetectionMode {
        self.mode
    }

    /// Apply an event; events that do not qualify in this mode are ignored.
    pub fn apply(&mut self, event: DetectionEvent) -> Option<Transition> {
        let (next, transition) = transition(self.mode, self.state, event);
        self.state = next;
        transition
    }
}

fn transition(
    mode: DetectionMode,
    state: PresenceState,
    event: DetectionEvent,
) -> (PresenceState, Option<Transition>) {
    use DetectionEvent::{MotionCleared, MotionDetected, WeightCleared, WeightDetected};
    use PresenceState::{BirdPresent, Idle};

    let (arrive, depart) = match mode {
        DetectionMode::MotionOnly | DetectionMode::MotionAndWeight => {
            (MotionDetected, MotionCleared)
        }
        DetectionMode::WeightOnly => (WeightDetected, WeightCleared),
    };

    match state {
        Idle if event == arrive => (BirdPresent, Some(Transition::Arrived)),
        BirdPresent if event == depart => (Idle, Some(Transition::Departed)),
        _ => (state, None),
    }
}
