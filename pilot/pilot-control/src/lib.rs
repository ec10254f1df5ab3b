//! Per-tick motion control with collision vetoes and fallback.
//!
//! [`MotionController`] turns "move this point there" and "face that way"
//! requests into normalized force and torque ratios:
//!
//! - Translation speed is limited per body axis so the body can always stop
//!   at the destination with the braking force available on that axis
//!   ([`max_stopping_speed`], [`axis_speed_limits`]).
//! - Rotation uses the same envelope with an angular acceleration learned
//!   online by [`TorqueCalibrator`].
//! - Before committing either, the controller asks the
//!   [`pilot_profiler::CollisionProfiler`] whether the motion would sweep
//!   into another body.
//! - A [`ProgressTracker`] declares the controller stuck when distance or
//!   angle stops improving, and an [`OverworkMonitor`] switches rotation to
//!   leveling when holding against the environment saturates the actuators.
//!
//! Commands leave through [`MotionController::apply`], which sends a stop
//! once per zero-command streak ([`CommandLatch`]).
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use pilot_control::{MotionController, MoveOutcome, MoveRequest, TickFrame};
//! use pilot_occupancy::OccupancyRegistry;
//! use pilot_types::{
//!     ActuatorCapability, ActuatorCommands, BodyDescriptor, BodyId, CellCoord, ControllerConfig,
//!     FixedActuators, RigidBodyState,
//! };
//! use nalgebra::{Point3, Vector2, Vector3};
//!
//! #[derive(Default)]
//! struct Thrusters {
//!     stops: usize,
//! }
//!
//! impl ActuatorCommands for Thrusters {
//!     fn apply_force_and_torque(&mut self, _: Vector3<f64>, _: Vector2<f64>, _: f64) {}
//!     fn set_damping(&mut self, _: bool) {}
//!     fn stop(&mut self) {
//!         self.stops += 1;
//!     }
//! }
//!
//! let registry = Arc::new(OccupancyRegistry::new());
//! registry.register(BodyDescriptor::grid(BodyId(7), 0.5), [CellCoord::origin()]).unwrap();
//! let mut controller =
//!     MotionController::new(BodyId(7), Arc::clone(&registry), ControllerConfig::default()).unwrap();
//!
//! let actuators = FixedActuators::new(ActuatorCapability::uniform(500.0, 50.0));
//! let here = Point3::new(3.0, 0.0, 0.0);
//! let body = RigidBodyState::new(here, 200.0);
//! let mut thrusters = Thrusters::default();
//!
//! for tick in 0..3 {
//!     let frame = TickFrame::new(tick, body, &actuators);
//!     let outcome = controller.compute_move(&frame, &MoveRequest::new(here, here));
//!     assert_eq!(outcome, MoveOutcome::Arrived);
//!     controller.apply(&mut thrusters);
//! }
//! assert_eq!(thrusters.stops, 1);
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod calibration;
mod controller;
mod fallback;
mod latch;
mod stopping;

pub use calibration::{CalibrationSample, TorqueCalibrator};
pub use controller::{
    MotionController, MoveOutcome, MoveRequest, RotateOutcome, RotateRequest, TargetBody,
    TickFrame, feed_forward_rate, force_ratio,
};
pub use fallback::{
    FallbackMonitor, FallbackState, Measure, OverworkMonitor, Progress, ProgressTracker,
    holding_saturation,
};
pub use latch::{CommandLatch, LatchAction};
pub use stopping::{
    axis_speed_limits, clamp_norm, max_stopping_speed, required_deceleration, speed_along,
};
