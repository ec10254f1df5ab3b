//! Per-body occupancy cache and its copied-out snapshot.

use std::sync::Arc;

use hashbrown::HashSet;
use nalgebra::Vector3;
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use pilot_types::{BodyDescriptor, BodyId, CellCoord, Result};
use tracing::{debug, warn};

/// Read-only view of a body's occupied cells at one cache version.
///
/// Snapshots own their data, so readers never hold the cache lock while
/// iterating. Cells are sorted, which fixes the iteration order used by the
/// profiler's "first hit wins" rule.
#[derive(Debug, Clone)]
pub struct OccupancySnapshot {
    body: BodyId,
    cell_size: f64,
    version: u64,
    cells: Arc<[CellCoord]>,
    max_cell_distance: f64,
}

impl OccupancySnapshot {
    fn build(body: BodyId, cell_size: f64, version: u64, set: &HashSet<CellCoord>) -> Self {
        let mut cells: Vec<CellCoord> = set.iter().copied().collect();
        cells.sort_unstable();
        let max_len_sq = cells.iter().map(|c| c.length_squared()).max().unwrap_or(0);
        #[allow(clippy::cast_precision_loss)]
        let max_cell_distance = (max_len_sq as f64).sqrt() * cell_size;
        Self {
            body,
            cell_size,
            version,
            cells: cells.into(),
            max_cell_distance,
        }
    }

    /// Body the snapshot belongs to.
    #[must_use]
    pub const fn body(&self) -> BodyId {
        self.body
    }

    /// Edge length of one cell in world units.
    #[must_use]
    pub const fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Cache version the snapshot was taken at.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Occupied cells in ascending order.
    #[must_use]
    pub fn cells(&self) -> &[CellCoord] {
        &self.cells
    }

    /// Number of occupied cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns `true` if no cell is occupied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Largest distance from the body origin to an occupied cell centre.
    #[must_use]
    pub const fn max_cell_distance(&self) -> f64 {
        self.max_cell_distance
    }

    /// Body-local position of a cell centre.
    #[must_use]
    pub fn local_position(&self, cell: CellCoord) -> Vector3<f64> {
        cell.local_position(self.cell_size)
    }

    /// Body-local positions of all occupied cells, in cell order.
    pub fn local_positions(&self) -> impl Iterator<Item = Vector3<f64>> + '_ {
        self.cells.iter().map(|c| c.local_position(self.cell_size))
    }
}

#[derive(Debug)]
struct CacheState {
    cells: HashSet<CellCoord>,
    version: u64,
    snapshot: Option<OccupancySnapshot>,
    released: bool,
}

/// Shared handle to one body's set of occupied cells.
///
/// Structural updates take the exclusive lock; snapshot reads take the shared
/// lock and copy out. Cloning the handle shares the same cache.
///
/// # Example
///
/// ```
/// use pilot_occupancy::OccupancyCache;
/// use pilot_types::{BodyDescriptor, BodyId, CellCoord};
///
/// let cache = OccupancyCache::new(
///     BodyDescriptor::grid(BodyId(1), 0.5),
///     [CellCoord::new(0, 0, 0), CellCoord::new(1, 0, 0)],
/// )
/// .unwrap();
///
/// cache.remove([CellCoord::new(1, 0, 0)]);
/// let snapshot = cache.snapshot();
/// assert_eq!(snapshot.cells(), &[CellCoord::new(0, 0, 0)]);
/// ```
#[derive(Debug, Clone)]
pub struct OccupancyCache {
    descriptor: BodyDescriptor,
    state: Arc<RwLock<CacheState>>,
}

impl OccupancyCache {
    /// Creates a cache holding the initial cells.
    ///
    /// # Errors
    ///
    /// Returns [`pilot_types::PilotError::InvalidCellSize`] if the descriptor's
    /// cell size is not positive and finite.
    pub fn new(
        descriptor: BodyDescriptor,
        cells: impl IntoIterator<Item = CellCoord>,
    ) -> Result<Self> {
        descriptor.kind.validate()?;
        let cells: HashSet<CellCoord> = cells.into_iter().collect();
        debug!(
            body = %descriptor.id,
            cells = cells.len(),
            "Created occupancy cache"
        );
        Ok(Self {
            descriptor,
            state: Arc::new(RwLock::new(CacheState {
                cells,
                version: 0,
                snapshot: None,
                released: false,
            })),
        })
    }

    /// Descriptor the cache was created with.
    #[must_use]
    pub const fn descriptor(&self) -> &BodyDescriptor {
        &self.descriptor
    }

    /// Owning body.
    #[must_use]
    pub const fn body(&self) -> BodyId {
        self.descriptor.id
    }

    /// Edge length of one cell.
    #[must_use]
    pub const fn cell_size(&self) -> f64 {
        self.descriptor.cell_size()
    }

    /// Inserts cells, returning how many were not already present.
    ///
    /// A change that inserts at least one cell commits a new version.
    pub fn add(&self, cells: impl IntoIterator<Item = CellCoord>) -> usize {
        let mut state = self.state.write();
        if state.released {
            warn!(body = %self.descriptor.id, "Ignoring cells added to a released cache");
            return 0;
        }
        let added = cells.into_iter().filter(|c| state.cells.insert(*c)).count();
        if added > 0 {
            state.version += 1;
            state.snapshot = None;
            debug!(
                body = %self.descriptor.id,
                added,
                total = state.cells.len(),
                version = state.version,
                "Occupancy cells added"
            );
        }
        added
    }

    /// Removes cells, returning how many were present.
    ///
    /// Removing an absent cell is a no-op.
    pub fn remove(&self, cells: impl IntoIterator<Item = CellCoord>) -> usize {
        let mut state = self.state.write();
        if state.released {
            warn!(body = %self.descriptor.id, "Ignoring cells removed from a released cache");
            return 0;
        }
        let removed = cells.into_iter().filter(|c| state.cells.remove(c)).count();
        if removed > 0 {
            state.version += 1;
            state.snapshot = None;
            debug!(
                body = %self.descriptor.id,
                removed,
                total = state.cells.len(),
                version = state.version,
                "Occupancy cells removed"
            );
        }
        removed
    }

    /// Returns `true` if the cell is occupied.
    #[must_use]
    pub fn contains(&self, cell: CellCoord) -> bool {
        self.state.read().cells.contains(&cell)
    }

    /// Number of occupied cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().cells.len()
    }

    /// Returns `true` if no cell is occupied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().cells.is_empty()
    }

    /// Current committed version.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.state.read().version
    }

    /// Returns `true` once the owning body has been destroyed.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.state.read().released
    }

    /// Copies out the current cell set.
    ///
    /// The snapshot is cached until the next committed change, so repeated
    /// reads between structural changes share one allocation.
    #[must_use]
    pub fn snapshot(&self) -> OccupancySnapshot {
        {
            let state = self.state.read();
            if let Some(snapshot) = &state.snapshot {
                return snapshot.clone();
            }
        }

        let state = self.state.upgradable_read();
        if let Some(snapshot) = &state.snapshot {
            return snapshot.clone();
        }
        let mut state = RwLockUpgradableReadGuard::upgrade(state);
        let snapshot = OccupancySnapshot::build(
            self.descriptor.id,
            self.descriptor.cell_size(),
            state.version,
            &state.cells,
        );
        state.snapshot = Some(snapshot.clone());
        snapshot
    }

    pub(crate) fn release(&self) {
        let mut state = self.state.write();
        state.released = true;
        state.snapshot = None;
    }
}
