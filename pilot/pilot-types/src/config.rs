//! Configuration types.
//!
//! [`NavSettings`] is the per-tick snapshot delivered by the navigation layer.
//! [`ControllerConfig`] and [`ProfilerConfig`] hold tunables that rarely change.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{PilotError, Result};

/// Navigation settings recognized by the controller each tick.
///
/// # Example
///
/// ```
/// use pilot_types::NavSettings;
///
/// let nav = NavSettings::default()
///     .with_speed_target(10.0)
///     .with_collision_avoidance(false);
/// assert_eq!(nav.speed_target, 10.0);
/// assert!(nav.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NavSettings {
    /// Consult the collision profiler before committing motion.
    pub collision_avoidance: bool,
    /// Absolute speed cap (m/s).
    pub speed_target: f64,
    /// Cap on speed relative to the destination (m/s).
    pub speed_max_relative: f64,
    /// Distance at which the destination counts as reached (m).
    pub destination_radius: f64,
    /// Whether the controller may propose corrective waypoints.
    pub pathfinder_can_change_course: bool,
}

impl Default for NavSettings {
    fn default() -> Self {
        Self {
            collision_avoidance: true,
            speed_target: 100.0,
            speed_max_relative: f64::INFINITY,
            destination_radius: 1.0,
            pathfinder_can_change_course: true,
        }
    }
}

impl NavSettings {
    /// Enables or disables collision avoidance.
    #[must_use]
    pub const fn with_collision_avoidance(mut self, enabled: bool) -> Self {
        self.collision_avoidance = enabled;
        self
    }

    /// Sets the absolute speed cap.
    #[must_use]
    pub const fn with_speed_target(mut self, speed: f64) -> Self {
        self.speed_target = speed;
        self
    }

    /// Sets the relative speed cap.
    #[must_use]
    pub const fn with_speed_max_relative(mut self, speed: f64) -> Self {
        self.speed_max_relative = speed;
        self
    }

    /// Sets the arrival radius.
    #[must_use]
    pub const fn with_destination_radius(mut self, radius: f64) -> Self {
        self.destination_radius = radius;
        self
    }

    /// Allows or forbids corrective waypoints.
    #[must_use]
    pub const fn with_course_changes(mut self, allowed: bool) -> Self {
        self.pathfinder_can_change_course = allowed;
        self
    }

    /// Validates the settings.
    ///
    /// # Errors
    ///
    /// Returns [`PilotError::InvalidConfig`] if a speed cap is negative or NaN,
    /// or the destination radius is negative or not finite.
    pub fn validate(&self) -> Result<()> {
        if self.speed_target.is_nan() || self.speed_target < 0.0 {
            return Err(PilotError::invalid_config("speed_target must be non-negative"));
        }
        if self.speed_max_relative.is_nan() || self.speed_max_relative < 0.0 {
            return Err(PilotError::invalid_config(
                "speed_max_relative must be non-negative",
            ));
        }
        if !self.destination_radius.is_finite() || self.destination_radius < 0.0 {
            return Err(PilotError::invalid_config(
                "destination_radius must be finite and non-negative",
            ));
        }
        Ok(())
    }
}

/// Tunables for the motion controller.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ControllerConfig {
    /// Length of one control tick (seconds).
    pub tick_seconds: f64,
    /// Linear cap on stopping speed per unit of remaining distance (1/s).
    pub reaction_gain: f64,
    /// Scale applied to the per-axis stopping envelope.
    pub stopping_margin: f64,
    /// Fraction of remaining distance used as speed on axes that cannot brake.
    pub weak_axis_fraction: f64,
    /// Braking acceleration below which an axis counts as unable to brake (m/s²).
    pub weak_axis_accel: f64,
    /// Landing speed per metre of remaining distance (1/s).
    pub landing_speed_gain: f64,
    /// Lowest landing speed cap (m/s).
    pub landing_speed_floor: f64,
    /// Ticks without progress before the controller is stuck.
    pub stuck_ticks: u32,
    /// Distance improvement that counts as progress (m).
    pub progress_epsilon: f64,
    /// Angle improvement that counts as progress (rad).
    pub angle_epsilon: f64,
    /// Bias-holding saturation at which actuators count as overworked.
    pub overwork_ratio: f64,
    /// Half-width of the overwork hysteresis band.
    pub overwork_hysteresis: f64,
    /// Largest tick gap across which a calibration sample is still coherent.
    pub calibration_window_ticks: u64,
    /// Weight of a new calibration sample in the running estimate.
    pub calibration_smoothing: f64,
    /// Smallest commanded ratio that produces a calibration sample.
    pub calibration_min_ratio: f64,
    /// Distance of a corrective waypoint from the reference point (m).
    pub recovery_distance: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            tick_seconds: 1.0 / 60.0,
            reaction_gain: 0.5,
            stopping_margin: 0.5,
            weak_axis_fraction: 0.1,
            weak_axis_accel: 0.01,
            landing_speed_gain: 0.2,
            landing_speed_floor: 0.5,
            stuck_ticks: 600,
            progress_epsilon: 0.05,
            angle_epsilon: 0.005,
            overwork_ratio: 0.75,
            overwork_hysteresis: 0.05,
            calibration_window_ticks: 10,
            calibration_smoothing: 0.1,
            calibration_min_ratio: 0.05,
            recovery_distance: 20.0,
        }
    }
}

impl ControllerConfig {
    /// Sets the stuck deadline in ticks.
    #[must_use]
    pub const fn with_stuck_ticks(mut self, ticks: u32) -> Self {
        self.stuck_ticks = ticks;
        self
    }

    /// Sets the tick length.
    #[must_use]
    pub const fn with_tick_seconds(mut self, seconds: f64) -> Self {
        self.tick_seconds = seconds;
        self
    }

    /// Sets the overwork threshold.
    #[must_use]
    pub const fn with_overwork_ratio(mut self, ratio: f64) -> Self {
        self.overwork_ratio = ratio;
        self
    }

    /// Sets the calibration validity window.
    #[must_use]
    pub const fn with_calibration_window(mut self, ticks: u64) -> Self {
        self.calibration_window_ticks = ticks;
        self
    }

    /// Sets the corrective waypoint distance.
    #[must_use]
    pub const fn with_recovery_distance(mut self, distance: f64) -> Self {
        self.recovery_distance = distance;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PilotError::InvalidConfig`] naming the first parameter out of range.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("tick_seconds", self.tick_seconds),
            ("reaction_gain", self.reaction_gain),
            ("stopping_margin", self.stopping_margin),
            ("weak_axis_fraction", self.weak_axis_fraction),
            ("weak_axis_accel", self.weak_axis_accel),
            ("landing_speed_gain", self.landing_speed_gain),
            ("landing_speed_floor", self.landing_speed_floor),
            ("calibration_min_ratio", self.calibration_min_ratio),
            ("recovery_distance", self.recovery_distance),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(PilotError::invalid_config(format!(
                    "{name} must be positive and finite, got {value}"
                )));
            }
        }
        if self.stopping_margin > 1.0 {
            return Err(PilotError::invalid_config("stopping_margin must not exceed 1"));
        }
        if self.stuck_ticks == 0 {
            return Err(PilotError::invalid_config("stuck_ticks must be positive"));
        }
        if self.calibration_window_ticks == 0 {
            return Err(PilotError::invalid_config(
                "calibration_window_ticks must be positive",
            ));
        }
        if !(0.0..=1.0).contains(&self.calibration_smoothing) || self.calibration_smoothing == 0.0 {
            return Err(PilotError::invalid_config(
                "calibration_smoothing must be in (0, 1]",
            ));
        }
        if self.progress_epsilon < 0.0 || self.angle_epsilon < 0.0 {
            return Err(PilotError::invalid_config("progress epsilons must be non-negative"));
        }
        if self.overwork_hysteresis < 0.0 || self.overwork_hysteresis >= self.overwork_ratio {
            return Err(PilotError::invalid_config(
                "overwork_hysteresis must be in [0, overwork_ratio)",
            ));
        }
        Ok(())
    }
}

/// Tunables for the collision profiler.
///
/// The obstruction threshold is a heuristic carried over as-is: a candidate
/// cell obstructs when its squared rejected distance to an owner cell is below
/// `clearance_factor * (own_cell_size + other_cell_size)`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProfilerConfig {
    /// Multiplier on the summed cell sizes.
    pub clearance_factor: f64,
    /// Extra capsule radius in owner cells.
    pub capsule_margin_cells: f64,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            clearance_factor: 2.0,
            capsule_margin_cells: 1.0,
        }
    }
}

impl ProfilerConfig {
    /// Sets the clearance factor.
    #[must_use]
    pub const fn with_clearance_factor(mut self, factor: f64) -> Self {
        self.clearance_factor = factor;
        self
    }

    /// Squared-distance threshold for two bodies with the given cell sizes.
    ///
    /// ```
    /// use pilot_types::ProfilerConfig;
    ///
    /// let config = ProfilerConfig::default();
    /// assert_eq!(config.threshold_sq(0.5, 2.5), 6.0);
    /// ```
    #[must_use]
    pub fn threshold_sq(&self, own_cell_size: f64, other_cell_size: f64) -> f64 {
        self.clearance_factor * (own_cell_size + other_cell_size)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PilotError::InvalidConfig`] if a parameter is negative or not finite.
    pub fn validate(&self) -> Result<()> {
        if !self.clearance_factor.is_finite() || self.clearance_factor <= 0.0 {
            return Err(PilotError::invalid_config("clearance_factor must be positive"));
        }
        if !self.capsule_margin_cells.is_finite() || self.capsule_margin_cells < 0.0 {
            return Err(PilotError::invalid_config(
                "capsule_margin_cells must be non-negative",
            ));
        }
        Ok(())
    }
}
