//! Online estimate of angular acceleration per unit of torque ratio.
//!
//! Actuator torque response is not known up front, so the controller learns
//! it: after commanding a torque ratio on one tick it measures the angular
//! acceleration actually produced by the next observation and folds the
//! quotient into an exponentially smoothed estimate.

use nalgebra::Vector3;
use pilot_types::ControllerConfig;
use tracing::{debug, trace};

/// Result of feeding one observation to the calibrator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalibrationSample {
    /// The sample was folded in; holds the new estimate.
    Accepted(f64),
    /// The previous command is too old (or too recent) to pair with this
    /// observation.
    Stale,
    /// No command large enough to measure was pending.
    NoCommand,
    /// The measured response was not a positive finite number.
    Rejected,
}

#[derive(Debug, Clone, Copy)]
struct PendingCommand {
    tick: u64,
    ratio: Vector3<f64>,
    angular_velocity: Vector3<f64>,
}

/// Smoothed estimate of angular acceleration (rad/s²) at full torque ratio.
///
/// Ticks are supplied by the caller, so the estimator is deterministic under
/// synthetic tick sequences.
///
/// # Example
///
/// ```
/// use pilot_control::{CalibrationSample, TorqueCalibrator};
/// use pilot_types::ControllerConfig;
/// use nalgebra::Vector3;
///
/// let config = ControllerConfig::default().with_tick_seconds(0.1);
/// let mut cal = TorqueCalibrator::new(&config);
/// cal.seed(1.0);
///
/// // Full yaw ratio for one tick raised yaw rate by 0.4 rad/s: 4 rad/s².
/// cal.commanded(1, Vector3::new(0.0, 1.0, 0.0), Vector3::zeros());
/// let sample = cal.observe(2, Vector3::new(0.0, 0.4, 0.0));
/// assert!(matches!(sample, CalibrationSample::Accepted(_)));
/// assert!(cal.estimate() > 1.0);
/// ```
#[derive(Debug, Clone)]
pub struct TorqueCalibrator {
    tick_seconds: f64,
    window_ticks: u64,
    smoothing: f64,
    min_ratio: f64,
    estimate: Option<f64>,
    samples: u64,
    pending: Option<PendingCommand>,
}

impl TorqueCalibrator {
    /// Creates an unseeded calibrator from the controller configuration.
    #[must_use]
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            tick_seconds: config.tick_seconds,
            window_ticks: config.calibration_window_ticks,
            smoothing: config.calibration_smoothing,
            min_ratio: config.calibration_min_ratio,
            estimate: None,
            samples: 0,
            pending: None,
        }
    }

    /// Sets the prior used until the first sample is accepted.
    ///
    /// Ignored once a sample has been accepted.
    pub fn seed(&mut self, prior: f64) {
        if self.samples == 0 && prior.is_finite() && prior > 0.0 {
            self.estimate = Some(prior);
        }
    }

    /// Current estimate, or zero before seeding.
    #[must_use]
    pub fn estimate(&self) -> f64 {
        self.estimate.unwrap_or(0.0)
    }

    /// Number of samples accepted so far.
    #[must_use]
    pub const fn samples(&self) -> u64 {
        self.samples
    }

    /// Records the torque ratio commanded at `tick` and the angular velocity
    /// observed when it was issued (body frame).
    pub fn commanded(&mut self, tick: u64, ratio: Vector3<f64>, angular_velocity: Vector3<f64>) {
        self.pending = Some(PendingCommand {
            tick,
            ratio,
            angular_velocity,
        });
    }

    /// Pairs the pending command with the angular velocity observed at `tick`.
    ///
    /// The pending command is consumed either way.
    pub fn observe(&mut self, tick: u64, angular_velocity: Vector3<f64>) -> CalibrationSample {
        let Some(pending) = self.pending.take() else {
            return CalibrationSample::NoCommand;
        };
        let magnitude = pending.ratio.norm();
        if magnitude < self.min_ratio {
            return CalibrationSample::NoCommand;
        }
        let gap = tick.saturating_sub(pending.tick);
        if gap == 0 || gap > self.window_ticks {
            trace!(
                tick,
                commanded_at = pending.tick,
                window = self.window_ticks,
                "Skipping stale torque calibration sample"
            );
            return CalibrationSample::Stale;
        }

        #[allow(clippy::cast_precision_loss)]
        let elapsed = gap as f64 * self.tick_seconds;
        let accel = (angular_velocity - pending.angular_velocity) / elapsed;
        let along = accel.dot(&(pending.ratio / magnitude));
        let sample = along / magnitude;
        if !sample.is_finite() || sample <= 0.0 {
            return CalibrationSample::Rejected;
        }

        let next = match self.estimate {
            Some(current) => current + self.smoothing * (sample - current),
            None => sample,
        };
        self.estimate = Some(next);
        self.samples += 1;
        debug!(sample, estimate = next, samples = self.samples, "Torque calibration sample");
        CalibrationSample::Accepted(next)
    }
}
