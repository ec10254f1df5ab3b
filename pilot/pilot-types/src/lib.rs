//! Foundation types for the pilot motion-control core.
//!
//! This crate holds the vocabulary shared by the occupancy, profiler and
//! control crates:
//!
//! - **Bodies**: [`BodyId`], the [`BodyKind`] capability descriptor resolved at
//!   registration, and the per-tick [`RigidBodyState`] snapshot
//! - **Cells**: [`CellCoord`], an integer lattice coordinate in body space
//! - **Actuators**: [`ActuatorCapability`], the [`ActuatorProfile`] query trait
//!   and the fire-and-forget [`ActuatorCommands`] interface
//! - **Configuration**: [`NavSettings`], [`ControllerConfig`], [`ProfilerConfig`]
//! - **Errors**: [`PilotError`]
//!
//! # Frames
//!
//! Body-local axes are right-handed: +X right, +Y up, +Z forward. World
//! quantities are converted through the body's orientation quaternion.
//!
//! # Example
//!
//! ```
//! use pilot_types::{ActuatorCapability, BodyDescriptor, BodyId, Direction, RigidBodyState};
//! use nalgebra::Point3;
//!
//! let ship = BodyDescriptor::grid(BodyId(1), 2.5);
//! assert!(ship.kind.is_structure());
//!
//! let state = RigidBodyState::new(Point3::new(0.0, 0.0, 0.0), 1000.0);
//! assert!(state.validate().is_ok());
//!
//! let cap = ActuatorCapability::uniform(2000.0, 500.0);
//! assert_eq!(cap.max_force(Direction::Forward) / state.mass, 2.0);
//! ```
//!
//! # Feature Flags
//!
//! - `serde`: Enables serialization/deserialization for value and config types

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod actuator;
pub mod body;
pub mod cell;
pub mod config;
pub mod error;

pub use actuator::{
    ActuatorCapability, ActuatorCommand, ActuatorCommands, ActuatorProfile, Direction,
    FixedActuators,
};
pub use body::{BodyDescriptor, BodyId, BodyKind, Neighbour, RigidBodyState};
pub use cell::CellCoord;
pub use config::{ControllerConfig, NavSettings, ProfilerConfig};
pub use error::{PilotError, Result};
