//! Session-wide map from body identity to its occupancy cache.

use hashbrown::HashMap;
use parking_lot::RwLock;
use pilot_types::{BodyDescriptor, BodyId, CellCoord, PilotError, Result};
use tracing::{debug, info, warn};

use crate::cache::{OccupancyCache, OccupancySnapshot};

/// Registry of occupancy caches keyed by [`BodyId`].
///
/// Lookups return cloned handles; the map lock is never held while a cache is
/// read or updated. Destroying a body removes its entry synchronously, after
/// which lookups fail with [`PilotError::BodyNotFound`].
///
/// # Example
///
/// ```
/// use pilot_occupancy::OccupancyRegistry;
/// use pilot_types::{BodyDescriptor, BodyId, CellCoord};
///
/// let registry = OccupancyRegistry::new();
/// let ship = BodyDescriptor::grid(BodyId(1), 2.5);
/// registry.register(ship, [CellCoord::origin()]).unwrap();
///
/// registry.on_part_added(BodyId(1), [CellCoord::new(0, 0, 1)]).unwrap();
/// assert_eq!(registry.snapshot(BodyId(1)).unwrap().len(), 2);
///
/// registry.on_body_destroyed(BodyId(1));
/// assert!(registry.get(BodyId(1)).is_err());
/// ```
#[derive(Debug, Default)]
pub struct OccupancyRegistry {
    entries: RwLock<HashMap<BodyId, OccupancyCache>>,
}

impl OccupancyRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a body with its initial cells.
    ///
    /// An existing entry for the same identity is released and replaced.
    ///
    /// # Errors
    ///
    /// Returns [`PilotError::InvalidCellSize`] if the descriptor is invalid.
    pub fn register(
        &self,
        descriptor: BodyDescriptor,
        cells: impl IntoIterator<Item = CellCoord>,
    ) -> Result<OccupancyCache> {
        let cache = OccupancyCache::new(descriptor, cells)?;
        let previous = self.entries.write().insert(descriptor.id, cache.clone());
        if let Some(previous) = previous {
            previous.release();
            warn!(body = %descriptor.id, "Replaced existing occupancy entry");
        }
        info!(
            body = %descriptor.id,
            cell_size = descriptor.cell_size(),
            cells = cache.len(),
            "Registered body"
        );
        Ok(cache)
    }

    /// Returns the cache for a body, creating it on first sight.
    ///
    /// Structures start empty and fill through part notifications. Other
    /// kinds occupy the single origin cell.
    ///
    /// # Errors
    ///
    /// Returns [`PilotError::InvalidCellSize`] if a new entry's descriptor is
    /// invalid.
    pub fn get_or_create(&self, descriptor: BodyDescriptor) -> Result<OccupancyCache> {
        if let Some(cache) = self.entries.read().get(&descriptor.id) {
            return Ok(cache.clone());
        }

        let mut entries = self.entries.write();
        if let Some(cache) = entries.get(&descriptor.id) {
            return Ok(cache.clone());
        }
        let seed = (!descriptor.kind.is_structure()).then(CellCoord::origin);
        let cache = OccupancyCache::new(descriptor, seed)?;
        entries.insert(descriptor.id, cache.clone());
        info!(
            body = %descriptor.id,
            cell_size = descriptor.cell_size(),
            structure = descriptor.kind.is_structure(),
            "Created occupancy entry"
        );
        Ok(cache)
    }

    /// Looks up a body's cache.
    ///
    /// # Errors
    ///
    /// Returns [`PilotError::BodyNotFound`] if the body is not registered.
    pub fn get(&self, id: BodyId) -> Result<OccupancyCache> {
        self.entries
            .read()
            .get(&id)
            .cloned()
            .ok_or(PilotError::BodyNotFound(id))
    }

    /// Snapshot of a body's current cells.
    ///
    /// # Errors
    ///
    /// Returns [`PilotError::BodyNotFound`] if the body is not registered.
    pub fn snapshot(&self, id: BodyId) -> Result<OccupancySnapshot> {
        self.get(id).map(|cache| cache.snapshot())
    }

    /// Descriptor a body was registered with.
    ///
    /// # Errors
    ///
    /// Returns [`PilotError::BodyNotFound`] if the body is not registered.
    pub fn descriptor(&self, id: BodyId) -> Result<BodyDescriptor> {
        self.get(id).map(|cache| *cache.descriptor())
    }

    /// Structural notification: a part covering `cells` was added.
    ///
    /// Returns the number of newly occupied cells.
    ///
    /// # Errors
    ///
    /// Returns [`PilotError::BodyNotFound`] if the body is not registered.
    pub fn on_part_added(
        &self,
        id: BodyId,
        cells: impl IntoIterator<Item = CellCoord>,
    ) -> Result<usize> {
        let cache = self.get(id)?;
        Ok(cache.add(cells))
    }

    /// Structural notification: a part covering `cells` was removed.
    ///
    /// Returns the number of cells that were occupied before the call.
    ///
    /// # Errors
    ///
    /// Returns [`PilotError::BodyNotFound`] if the body is not registered.
    pub fn on_part_removed(
        &self,
        id: BodyId,
        cells: impl IntoIterator<Item = CellCoord>,
    ) -> Result<usize> {
        let cache = self.get(id)?;
        Ok(cache.remove(cells))
    }

    /// Removes a destroyed body's entry.
    ///
    /// Returns `true` if an entry existed. Handles still held elsewhere are
    /// released and stop accepting updates.
    pub fn on_body_destroyed(&self, id: BodyId) -> bool {
        let removed = self.entries.write().remove(&id);
        match removed {
            Some(cache) => {
                cache.release();
                info!(body = %id, "Removed occupancy entry for destroyed body");
                true
            }
            None => {
                debug!(body = %id, "Destroy notification for unknown body");
                false
            }
        }
    }

    /// Returns `true` if the body is registered.
    #[must_use]
    pub fn contains(&self, id: BodyId) -> bool {
        self.entries.read().contains_key(&id)
    }

    /// Number of registered bodies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if no body is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Identities of all registered bodies, in ascending order.
    #[must_use]
    pub fn ids(&self) -> Vec<BodyId> {
        let mut ids: Vec<BodyId> = self.entries.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}
