//! Swept-capsule collision profiling.
//!
//! Before the controller commits a translation, the [`CollisionProfiler`]
//! answers "would this displacement hit another body?":
//!
//! 1. [`CollisionProfiler::prepare`] builds a [`SweepCapsule`] from the
//!    owner's centre to where it will be, and projects every owner cell onto
//!    the plane orthogonal to travel (the owner's silhouette).
//! 2. [`CollisionProfiler::test_obstruction`] keeps only candidate cells
//!    inside the capsule and checks their projections against the silhouette.
//!
//! Rotations are vetted by [`CollisionProfiler::test_rotate`], which compares
//! axial offset, radial distance and swept azimuth around the rotation axis.
//!
//! # Threshold
//!
//! Two cells collide when their squared rejected distance is below
//! `clearance_factor * (own_cell_size + other_cell_size)`; see
//! [`pilot_types::ProfilerConfig`].

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod capsule;
mod profiler;
mod rejection;

pub use capsule::{GEOM_EPSILON, SweepCapsule, closest_point_segment};
pub use profiler::{CollisionProfiler, Obstruction, ProfiledBody};
pub use rejection::{RejectionPlane, Silhouette, reject};
