//! Stopping-distance kinematics shared by translation and rotation.
//!
//! A body braking at constant deceleration `a` from speed `v` covers
//! `v² / (2a)`. Inverting that gives the fastest approach speed that still
//! stops at the goal: `v = sqrt(2 a d)`. The controller also caps the speed
//! linearly in `d` so the last stretch is covered slowly enough for a
//! one-tick reaction.

use nalgebra::{Unit, Vector3};
use pilot_types::ControllerConfig;

/// Highest speed from which a deceleration of `decel` stops within `distance`,
/// further capped at `reaction_gain * distance`.
///
/// Never exceeds `sqrt(2 * decel * distance)`. Non-positive or non-finite
/// inputs give zero.
///
/// ```
/// use pilot_control::max_stopping_speed;
///
/// // 2 m/s² over 100 m: sqrt(400) = 20, below the 0.5 * 100 linear cap.
/// assert_eq!(max_stopping_speed(100.0, 2.0, 0.5), 20.0);
/// // Close in, the linear cap takes over.
/// assert_eq!(max_stopping_speed(1.0, 2.0, 0.5), 0.5);
/// ```
#[must_use]
pub fn max_stopping_speed(distance: f64, decel: f64, reaction_gain: f64) -> f64 {
    if !(distance > 0.0 && decel > 0.0) || !distance.is_finite() {
        return 0.0;
    }
    let kinematic = (2.0 * decel * distance).sqrt();
    if reaction_gain.is_finite() {
        kinematic.min(reaction_gain * distance)
    } else {
        kinematic
    }
}

/// Deceleration needed to stop from `speed` within `distance`.
///
/// Infinite when `distance` is zero and `speed` is not.
#[must_use]
pub fn required_deceleration(speed: f64, distance: f64) -> f64 {
    if speed == 0.0 {
        return 0.0;
    }
    if distance <= 0.0 {
        return f64::INFINITY;
    }
    speed * speed / (2.0 * distance)
}

/// Per-axis approach speed limits for a body-local displacement.
///
/// `braking` holds, per axis, the deceleration available against the
/// direction of travel on that axis. An axis that cannot brake usefully is
/// limited to a small fraction of its remaining distance instead of zero, so
/// the body keeps creeping toward the goal.
#[must_use]
pub fn axis_speed_limits(
    displacement: &Vector3<f64>,
    braking: &Vector3<f64>,
    config: &ControllerConfig,
) -> Vector3<f64> {
    Vector3::from_fn(|i, _| {
        let distance = displacement[i].abs();
        if distance == 0.0 {
            0.0
        } else if braking[i] <= config.weak_axis_accel {
            config.weak_axis_fraction * distance
        } else {
            config.stopping_margin * max_stopping_speed(distance, braking[i], config.reaction_gain)
        }
    })
}

/// Largest speed along `direction` whose components respect every axis limit.
///
/// Axes that `direction` does not use are ignored.
#[must_use]
pub fn speed_along(limits: &Vector3<f64>, direction: &Unit<Vector3<f64>>) -> f64 {
    (0..3)
        .filter(|&i| direction[i].abs() > 1e-9)
        .map(|i| limits[i] / direction[i].abs())
        .fold(f64::INFINITY, f64::min)
}

/// `v` scaled down to at most `max` in length.
#[must_use]
pub fn clamp_norm(v: Vector3<f64>, max: f64) -> Vector3<f64> {
    let norm = v.norm();
    if norm > max && norm > 0.0 {
        v * (max.max(0.0) / norm)
    } else {
        v
    }
}
