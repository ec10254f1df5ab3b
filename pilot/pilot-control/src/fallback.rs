//! Stuck detection and actuator-overwork hysteresis.

use std::fmt;

use nalgebra::Vector3;
use pilot_types::{ActuatorCapability, Direction};

/// Result of one progress observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// First value since creation or the last reset.
    Baseline,
    /// The value beat the best so far by more than the epsilon.
    Improved,
    /// No improvement; holds the number of consecutive stalled ticks.
    Stalled(u32),
    /// Stalled for longer than the deadline.
    Stuck,
}

/// Tracks a monotonically improving "best so far" value against a deadline.
///
/// Only an improvement by more than `epsilon` resets the deadline, so slow
/// drift or oscillation around the goal still counts as a stall.
///
/// # Example
///
/// ```
/// use pilot_control::{Progress, ProgressTracker};
///
/// let mut tracker = ProgressTracker::new(2, 0.1);
/// assert_eq!(tracker.observe(10.0), Progress::Baseline);
/// assert_eq!(tracker.observe(10.0), Progress::Stalled(1));
/// assert_eq!(tracker.observe(9.95), Progress::Stalled(2));
/// assert_eq!(tracker.observe(10.0), Progress::Stuck);
/// assert_eq!(tracker.observe(5.0), Progress::Improved);
/// ```
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    deadline: u32,
    epsilon: f64,
    best: Option<f64>,
    stalled: u32,
}

impl ProgressTracker {
    /// Creates a tracker that reports stuck after `deadline` stalled ticks.
    #[must_use]
    pub const fn new(deadline: u32, epsilon: f64) -> Self {
        Self {
            deadline,
            epsilon,
            best: None,
            stalled: 0,
        }
    }

    /// Best value seen since the last reset.
    #[must_use]
    pub const fn best(&self) -> Option<f64> {
        self.best
    }

    /// Consecutive ticks without improvement.
    #[must_use]
    pub const fn stalled_ticks(&self) -> u32 {
        self.stalled
    }

    /// Forgets the best value and restarts the deadline.
    pub fn reset(&mut self) {
        self.best = None;
        self.stalled = 0;
    }

    /// Feeds this tick's distance (or angle) to the goal.
    pub fn observe(&mut self, value: f64) -> Progress {
        let Some(best) = self.best else {
            self.best = Some(value);
            self.stalled = 0;
            return Progress::Baseline;
        };
        if value < best - self.epsilon {
            self.best = Some(value);
            self.stalled = 0;
            return Progress::Improved;
        }
        self.stalled = self.stalled.saturating_add(1);
        if self.stalled > self.deadline {
            Progress::Stuck
        } else {
            Progress::Stalled(self.stalled)
        }
    }
}

/// Controller-level progress state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackState {
    /// Making progress.
    #[default]
    Normal,
    /// No progress within the deadline; waiting for a corrective waypoint.
    Stuck,
    /// Following a corrective waypoint until progress resumes.
    Recovering,
}

impl FallbackState {
    /// Next state after a progress observation.
    #[must_use]
    pub const fn after(self, progress: Progress) -> Self {
        match (self, progress) {
            (_, Progress::Stuck) => Self::Stuck,
            (Self::Recovering | Self::Stuck, Progress::Improved) => Self::Normal,
            (state, _) => state,
        }
    }
}

impl fmt::Display for FallbackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Normal => "normal",
            Self::Stuck => "stuck",
            Self::Recovering => "recovering",
        };
        f.write_str(name)
    }
}

/// Progress measure a fallback verdict belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measure {
    /// Distance from the reference point to the destination.
    Distance,
    /// Remaining angular error.
    Angle,
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Distance => "distance",
            Self::Angle => "angle",
        })
    }
}

/// Separate fallback verdicts for distance and angle.
///
/// Each measure only clears its own verdict, so turning in place cannot
/// cancel a stuck translation. The combined state is STUCK while either
/// measure is stuck, RECOVERING while either recovers, NORMAL otherwise.
///
/// ```
/// use pilot_control::{FallbackMonitor, FallbackState, Measure, Progress};
///
/// let mut monitor = FallbackMonitor::new();
/// assert_eq!(monitor.observe(Measure::Distance, Progress::Stuck), Some(FallbackState::Stuck));
/// assert_eq!(monitor.observe(Measure::Angle, Progress::Improved), None);
/// assert!(monitor.begin_recovery());
/// assert_eq!(monitor.state(), FallbackState::Recovering);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackMonitor {
    distance: FallbackState,
    angle: FallbackState,
}

impl FallbackMonitor {
    /// Creates a monitor with both measures NORMAL.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Verdict of one measure.
    #[must_use]
    pub const fn measure_state(&self, measure: Measure) -> FallbackState {
        match measure {
            Measure::Distance => self.distance,
            Measure::Angle => self.angle,
        }
    }

    /// Combined state.
    #[must_use]
    pub fn state(&self) -> FallbackState {
        let states = [self.distance, self.angle];
        if states.contains(&FallbackState::Stuck) {
            FallbackState::Stuck
        } else if states.contains(&FallbackState::Recovering) {
            FallbackState::Recovering
        } else {
            FallbackState::Normal
        }
    }

    fn slot(&mut self, measure: Measure) -> &mut FallbackState {
        match measure {
            Measure::Distance => &mut self.distance,
            Measure::Angle => &mut self.angle,
        }
    }

    fn set(&mut self, measure: Measure, next: FallbackState) -> Option<FallbackState> {
        let before = self.state();
        *self.slot(measure) = next;
        let after = self.state();
        (after != before).then_some(after)
    }

    /// Folds a progress observation into `measure`'s verdict; returns the
    /// combined state when it changes.
    pub fn observe(&mut self, measure: Measure, progress: Progress) -> Option<FallbackState> {
        let next = self.measure_state(measure).after(progress);
        self.set(measure, next)
    }

    /// The goal for `measure` was reached: its verdict returns to NORMAL.
    pub fn settle(&mut self, measure: Measure) -> Option<FallbackState> {
        self.set(measure, FallbackState::Normal)
    }

    /// Moves every stuck measure to RECOVERING. Returns `false` if nothing
    /// was stuck.
    pub fn begin_recovery(&mut self) -> bool {
        let mut any = false;
        for slot in [&mut self.distance, &mut self.angle] {
            if *slot == FallbackState::Stuck {
                *slot = FallbackState::Recovering;
                any = true;
            }
        }
        any
    }
}

/// Fraction of available force needed to hold against `bias`.
///
/// For each body-local axis the holding force opposes the bias component;
/// the result is the largest needed/available ratio over the six directions.
/// A direction that must hold but has no force gives infinity.
#[must_use]
pub fn holding_saturation(
    capability: &ActuatorCapability,
    bias_local: &Vector3<f64>,
    mass: f64,
) -> f64 {
    (0..3)
        .map(|axis| {
            let needed = -bias_local[axis] * mass;
            if needed == 0.0 {
                return 0.0;
            }
            let available = capability.max_force(Direction::along(axis, needed));
            if available > 0.0 {
                needed.abs() / available
            } else {
                f64::INFINITY
            }
        })
        .fold(0.0, f64::max)
}

/// Overworked flag with a hysteresis band around the threshold.
///
/// ```
/// use pilot_control::OverworkMonitor;
///
/// let mut monitor = OverworkMonitor::new(0.75, 0.05);
/// assert_eq!(monitor.update(0.79), None);
/// assert_eq!(monitor.update(0.81), Some(true));
/// assert_eq!(monitor.update(0.71), None);
/// assert_eq!(monitor.update(0.69), Some(false));
/// ```
#[derive(Debug, Clone)]
pub struct OverworkMonitor {
    ratio: f64,
    hysteresis: f64,
    overworked: bool,
    saturation: f64,
}

impl OverworkMonitor {
    /// Creates a monitor around `ratio` with a band of `hysteresis` each side.
    #[must_use]
    pub const fn new(ratio: f64, hysteresis: f64) -> Self {
        Self {
            ratio,
            hysteresis,
            overworked: false,
            saturation: 0.0,
        }
    }

    /// Returns `true` while overworked.
    #[must_use]
    pub const fn is_overworked(&self) -> bool {
        self.overworked
    }

    /// Last saturation fed to [`update`](Self::update).
    #[must_use]
    pub const fn saturation(&self) -> f64 {
        self.saturation
    }

    /// Feeds the current saturation; returns the new flag on a transition.
    pub fn update(&mut self, saturation: f64) -> Option<bool> {
        self.saturation = saturation;
        let next = if self.overworked {
            saturation >= self.ratio - self.hysteresis
        } else {
            saturation > self.ratio + self.hysteresis
        };
        if next == self.overworked {
            None
        } else {
            self.overworked = next;
            Some(next)
        }
    }
}
