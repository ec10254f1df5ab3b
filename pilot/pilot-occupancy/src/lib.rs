//! Concurrent per-body occupancy caches.
//!
//! Every rigid body the controller may need to avoid owns an
//! [`OccupancyCache`]: the set of lattice cells its parts cover. Structural
//! notifications mutate the cache under an exclusive lock; the profiler reads
//! it through copied-out [`OccupancySnapshot`]s, so a reader sees either the
//! state before or after a committed change and never a partial one.
//!
//! [`OccupancyRegistry`] maps body identities to their caches and drops an
//! entry as soon as the body is destroyed.
//!
//! # Example
//!
//! ```
//! use pilot_occupancy::OccupancyRegistry;
//! use pilot_types::{BodyDescriptor, BodyId, CellCoord};
//!
//! let registry = OccupancyRegistry::new();
//! let cache = registry
//!     .register(BodyDescriptor::grid(BodyId(4), 0.5), CellCoord::span(
//!         CellCoord::new(-1, 0, -2),
//!         CellCoord::new(1, 0, 2),
//!     ))
//!     .unwrap();
//!
//! let snapshot = cache.snapshot();
//! assert_eq!(snapshot.len(), 15);
//! assert!(snapshot.max_cell_distance() > 1.0);
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod cache;
mod registry;

pub use cache::{OccupancyCache, OccupancySnapshot};
pub use registry::OccupancyRegistry;
