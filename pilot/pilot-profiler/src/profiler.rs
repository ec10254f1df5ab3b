//! Obstruction tests for planned translations and rotations.

use std::f64::consts::TAU;

use nalgebra::{Point3, Unit, Vector3};
use pilot_occupancy::{OccupancyRegistry, OccupancySnapshot};
use pilot_types::{BodyId, CellCoord, ProfilerConfig, Result, RigidBodyState};
use tracing::debug;

use crate::capsule::{GEOM_EPSILON, SweepCapsule};
use crate::rejection::{RejectionPlane, Silhouette};

/// A body as the profiler sees it for one tick: pose plus occupancy.
#[derive(Debug, Clone)]
pub struct ProfiledBody {
    state: RigidBodyState,
    snapshot: OccupancySnapshot,
}

impl ProfiledBody {
    /// Pairs a kinematic state with an occupancy snapshot.
    #[must_use]
    pub const fn new(state: RigidBodyState, snapshot: OccupancySnapshot) -> Self {
        Self { state, snapshot }
    }

    /// Looks up the body's occupancy in the registry.
    ///
    /// # Errors
    ///
    /// Returns [`pilot_types::PilotError::BodyNotFound`] if the body has no
    /// registry entry.
    pub fn from_registry(
        registry: &OccupancyRegistry,
        id: BodyId,
        state: RigidBodyState,
    ) -> Result<Self> {
        Ok(Self::new(state, registry.snapshot(id)?))
    }

    /// Body identity.
    #[must_use]
    pub const fn id(&self) -> BodyId {
        self.snapshot.body()
    }

    /// Kinematic state.
    #[must_use]
    pub const fn state(&self) -> &RigidBodyState {
        &self.state
    }

    /// Occupancy snapshot.
    #[must_use]
    pub const fn snapshot(&self) -> &OccupancySnapshot {
        &self.snapshot
    }

    /// Cell size.
    #[must_use]
    pub const fn cell_size(&self) -> f64 {
        self.snapshot.cell_size()
    }

    /// Radius of a sphere around the origin enclosing every occupied cell.
    #[must_use]
    pub fn bounding_radius(&self) -> f64 {
        self.snapshot.max_cell_distance() + self.cell_size() * 0.5
    }

    /// World offset of a cell centre from the body origin.
    #[must_use]
    pub fn world_offset(&self, cell: CellCoord) -> Vector3<f64> {
        self.state.to_world(&self.snapshot.local_position(cell))
    }

    /// World position of a cell centre.
    #[must_use]
    pub fn world_position(&self, cell: CellCoord) -> Point3<f64> {
        self.state.position + self.world_offset(cell)
    }
}

/// Where a planned motion would hit another body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obstruction {
    /// The obstructing body.
    pub body: BodyId,
    /// World point associated with the hit: the closest point on the swept
    /// segment for translations, the obstructing cell for rotations.
    pub point: Point3<f64>,
    /// The obstructing body's cell.
    pub cell: CellCoord,
}

#[derive(Debug, Clone)]
struct PreparedSweep {
    owner: BodyId,
    own_cell_size: f64,
    capsule: SweepCapsule,
    plane: RejectionPlane,
    silhouette: Silhouette,
    /// Smallest axial offset of any owner cell from the centre.
    min_axial: f64,
}

/// Swept-capsule collision profiler for one owning body.
///
/// [`prepare`](Self::prepare) projects the owner onto the plane orthogonal to
/// its travel direction once; each [`test_obstruction`](Self::test_obstruction)
/// then reduces to a 2-D proximity query for the candidate cells inside the
/// swept capsule. The test is conservative: it may report a hit that a
/// precise sweep would not, never the reverse.
///
/// # Example
///
/// ```
/// use pilot_occupancy::OccupancyRegistry;
/// use pilot_profiler::{CollisionProfiler, ProfiledBody};
/// use pilot_types::{BodyDescriptor, BodyId, CellCoord, RigidBodyState};
/// use nalgebra::Point3;
///
/// let registry = OccupancyRegistry::new();
/// registry.register(BodyDescriptor::grid(BodyId(1), 1.0), [CellCoord::origin()]).unwrap();
/// registry.register(BodyDescriptor::floating(BodyId(2), 0.5), [CellCoord::origin()]).unwrap();
///
/// let own = ProfiledBody::from_registry(
///     &registry, BodyId(1), RigidBodyState::new(Point3::origin(), 100.0)).unwrap();
/// let rock = ProfiledBody::from_registry(
///     &registry, BodyId(2), RigidBodyState::new(Point3::new(0.0, 0.0, 10.0), 5.0)).unwrap();
///
/// let mut profiler = CollisionProfiler::default();
/// profiler.prepare(&own, Point3::new(0.0, 0.0, 20.0), Point3::origin());
/// let hit = profiler.test_obstruction(&rock, None).unwrap();
/// assert_eq!(hit.body, BodyId(2));
/// assert!(profiler.test_obstruction(&rock, Some(BodyId(2))).is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CollisionProfiler {
    config: ProfilerConfig,
    sweep: Option<PreparedSweep>,
}

impl CollisionProfiler {
    /// Creates a profiler.
    ///
    /// # Errors
    ///
    /// Returns [`pilot_types::PilotError::InvalidConfig`] if the configuration is invalid.
    pub fn new(config: ProfilerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, sweep: None })
    }

    /// Profiler configuration.
    #[must_use]
    pub const fn config(&self) -> &ProfilerConfig {
        &self.config
    }

    /// Capsule of the current sweep, if one is prepared.
    #[must_use]
    pub fn capsule(&self) -> Option<&SweepCapsule> {
        self.sweep.as_ref().map(|s| &s.capsule)
    }

    /// Drops the prepared sweep.
    pub fn clear(&mut self) {
        self.sweep = None;
    }

    /// Prepares the sweep for moving `own` so that `reference_point` lands on
    /// `destination`.
    ///
    /// The capsule runs from the owner's centre to where the centre will be
    /// once the reference point arrives. A zero-length displacement prepares
    /// nothing and every subsequent test reports no obstruction.
    pub fn prepare(
        &mut self,
        own: &ProfiledBody,
        destination: Point3<f64>,
        reference_point: Point3<f64>,
    ) -> Option<&SweepCapsule> {
        let Some(direction) = Unit::try_new(destination - reference_point, GEOM_EPSILON) else {
            debug!(body = %own.id(), "Zero displacement, nothing to profile");
            self.sweep = None;
            return None;
        };

        let centre = own.state().position;
        let end = destination + (centre - reference_point);
        let own_cell_size = own.cell_size();
        let radius = own.snapshot().max_cell_distance()
            + self.config.capsule_margin_cells * own_cell_size;
        let capsule = SweepCapsule::new(centre, end, radius);

        let plane = RejectionPlane::new(direction);
        let mut silhouette = Silhouette::new(own_cell_size);
        let mut min_axial = 0.0_f64;
        for &cell in own.snapshot().cells() {
            let offset = own.world_offset(cell);
            silhouette.insert(plane.project(&offset));
            min_axial = min_axial.min(plane.axial(&offset));
        }

        debug!(
            body = %own.id(),
            cells = silhouette.len(),
            radius = capsule.radius(),
            length = capsule.length(),
            min_axial,
            "Prepared sweep"
        );

        self.sweep = Some(PreparedSweep {
            owner: own.id(),
            own_cell_size,
            capsule,
            plane,
            silhouette,
            min_axial,
        });
        self.capsule()
    }

    /// Tests whether the prepared sweep hits `candidate`.
    ///
    /// Returns the first hit in the candidate's cell order, or `None` when the
    /// path is clear, nothing is prepared, or the candidate is the owner or
    /// the `ignore`d body.
    #[must_use]
    pub fn test_obstruction(
        &self,
        candidate: &ProfiledBody,
        ignore: Option<BodyId>,
    ) -> Option<Obstruction> {
        let sweep = self.sweep.as_ref()?;
        if candidate.id() == sweep.owner || ignore == Some(candidate.id()) {
            return None;
        }
        let threshold_sq = self
            .config
            .threshold_sq(sweep.own_cell_size, candidate.cell_size());
        // The filter must pass every cell the rejection test could flag.
        let clearance = threshold_sq.sqrt().max(candidate.cell_size() * 0.5);

        let capsule = &sweep.capsule;
        if !capsule.contains(
            candidate.state().position,
            candidate.bounding_radius() + clearance,
        ) {
            return None;
        }

        for &cell in candidate.snapshot().cells() {
            let world = candidate.world_position(cell);
            if !capsule.contains(world, clearance) {
                continue;
            }
            let offset = world - capsule.start();
            // Only cells behind the owner's rearmost cell are out of reach.
            if sweep.plane.axial(&offset) < sweep.min_axial - clearance {
                continue;
            }
            if sweep
                .silhouette
                .any_within(&sweep.plane.project(&offset), threshold_sq)
            {
                return Some(Obstruction {
                    body: candidate.id(),
                    point: capsule.closest_point(world),
                    cell,
                });
            }
        }
        None
    }

    /// Runs [`test_obstruction`](Self::test_obstruction) over `candidates` and
    /// returns the hit closest to the start of the sweep.
    pub fn nearest_obstruction<'a>(
        &self,
        candidates: impl IntoIterator<Item = &'a ProfiledBody>,
        ignore: Option<BodyId>,
    ) -> Option<Obstruction> {
        let start = self.sweep.as_ref()?.capsule.start();
        candidates
            .into_iter()
            .filter_map(|c| self.test_obstruction(c, ignore))
            .min_by(|a, b| {
                let da = (a.point - start).norm_squared();
                let db = (b.point - start).norm_squared();
                da.total_cmp(&db)
            })
    }

    /// Tests whether rotating `own` by `angular_displacement` (world axis times
    /// angle, about the owner's centre) swings a cell into `candidate`.
    ///
    /// A candidate cell obstructs when its axial offset and radial distance
    /// both match an owner cell within the clearance and its azimuth lies in
    /// the arc that owner cell sweeps.
    #[must_use]
    pub fn test_rotate(
        &self,
        own: &ProfiledBody,
        angular_displacement: &Vector3<f64>,
        candidate: &ProfiledBody,
    ) -> Option<Obstruction> {
        if candidate.id() == own.id() {
            return None;
        }
        let angle = angular_displacement.norm();
        let axis = Unit::try_new(*angular_displacement, GEOM_EPSILON)?;

        let threshold = self
            .config
            .threshold_sq(own.cell_size(), candidate.cell_size())
            .sqrt();
        let centre = own.state().position;
        let reach = own.bounding_radius() + threshold;
        if (candidate.state().position - centre).norm()
            > reach + candidate.bounding_radius()
        {
            return None;
        }

        let plane = RejectionPlane::new(axis);
        let swept: Vec<(f64, f64, f64)> = own
            .snapshot()
            .cells()
            .iter()
            .map(|&cell| {
                let offset = own.world_offset(cell);
                let h = plane.axial(&offset);
                let r = plane.project(&offset).norm();
                (h, r, plane.azimuth(&offset))
            })
            .collect();

        for &cell in candidate.snapshot().cells() {
            let world = candidate.world_position(cell);
            let offset = world - centre;
            if offset.norm() > reach {
                continue;
            }
            let h = plane.axial(&offset);
            let r = plane.project(&offset).norm();
            let phi = plane.azimuth(&offset);

            let hit = swept.iter().any(|&(oh, or, ophi)| {
                if (h - oh).abs() >= threshold || (r - or).abs() >= threshold {
                    return false;
                }
                // Cells this close to the axis barely move; any overlap counts.
                if or < threshold {
                    return true;
                }
                let tolerance = threshold / or;
                let delta = (phi - ophi).rem_euclid(TAU);
                delta <= angle + tolerance || delta >= TAU - tolerance
            });
            if hit {
                return Some(Obstruction {
                    body: candidate.id(),
                    point: world,
                    cell,
                });
            }
        }
        None
    }

    /// First rotation obstruction among `candidates`, skipping `ignore`.
    pub fn first_rotate_obstruction<'a>(
        &self,
        own: &ProfiledBody,
        angular_displacement: &Vector3<f64>,
        candidates: impl IntoIterator<Item = &'a ProfiledBody>,
        ignore: Option<BodyId>,
    ) -> Option<Obstruction> {
        candidates
            .into_iter()
            .filter(|c| ignore != Some(c.id()))
            .find_map(|c| self.test_rotate(own, angular_displacement, c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::UnitQuaternion;
    use pilot_types::BodyDescriptor;
    use std::f64::consts::FRAC_PI_2;

    const OWN: BodyId = BodyId(1);
    const ROCK: BodyId = BodyId(2);

    fn registry_with(own_cells: &[CellCoord], other_cells: &[CellCoord]) -> OccupancyRegistry {
        let registry = OccupancyRegistry::new();
        registry
            .register(BodyDescriptor::grid(OWN, 1.0), own_cells.iter().copied())
            .unwrap();
        registry
            .register(BodyDescriptor::grid(ROCK, 1.0), other_cells.iter().copied())
            .unwrap();
        registry
    }

    fn body(registry: &OccupancyRegistry, id: BodyId, at: Point3<f64>) -> ProfiledBody {
        ProfiledBody::from_registry(registry, id, RigidBodyState::new(at, 100.0)).unwrap()
    }

    #[test]
    fn test_cell_on_axis_between_bodies_blocks() {
        let registry = registry_with(&[CellCoord::origin()], &[CellCoord::origin()]);
        let own = body(&registry, OWN, Point3::origin());
        let rock = body(&registry, ROCK, Point3::new(0.0, 0.0, 5.0));

        let mut profiler = CollisionProfiler::default();
        profiler.prepare(&own, Point3::new(0.0, 0.0, 10.0), Point3::origin());
        let hit = profiler.test_obstruction(&rock, None).unwrap();

        assert_eq!(hit.body, ROCK);
        assert_eq!(hit.cell, CellCoord::origin());
        assert_relative_eq!(hit.point, Point3::new(0.0, 0.0, 5.0), epsilon = 1e-12);
    }

    #[test]
    fn test_lateral_clearance_passes() {
        // threshold_sq = 2 * (1 + 1) = 4, so lateral distance 2 is clear.
        let registry = registry_with(&[CellCoord::origin()], &[CellCoord::origin()]);
        let own = body(&registry, OWN, Point3::origin());
        let mut profiler = CollisionProfiler::default();
        profiler.prepare(&own, Point3::new(0.0, 0.0, 10.0), Point3::origin());

        let clear = body(&registry, ROCK, Point3::new(2.0, 0.0, 5.0));
        assert!(profiler.test_obstruction(&clear, None).is_none());

        let grazing = body(&registry, ROCK, Point3::new(1.9, 0.0, 5.0));
        assert!(profiler.test_obstruction(&grazing, None).is_some());
    }

    #[test]
    fn test_cells_outside_capsule_are_ignored() {
        let registry = registry_with(&[CellCoord::origin()], &[CellCoord::origin()]);
        let own = body(&registry, OWN, Point3::origin());
        let mut profiler = CollisionProfiler::default();
        profiler.prepare(&own, Point3::new(0.0, 0.0, 10.0), Point3::origin());

        let beyond = body(&registry, ROCK, Point3::new(0.0, 0.0, 30.0));
        assert!(profiler.test_obstruction(&beyond, None).is_none());

        let behind = body(&registry, ROCK, Point3::new(0.0, 0.0, -2.5));
        assert!(profiler.test_obstruction(&behind, None).is_none());
    }

    #[test]
    fn test_rear_wing_sweeps_through_cell_behind_centre() {
        // The wing trails 5 m behind the centre and 3 m to the side; after
        // 3 m of travel it passes through the rock beside the tail.
        let wing = [CellCoord::origin(), CellCoord::new(3, 0, -5)];
        let registry = registry_with(&wing, &[CellCoord::origin()]);
        let own = body(&registry, OWN, Point3::origin());
        let rock = body(&registry, ROCK, Point3::new(3.0, 0.0, -2.0));

        let mut profiler = CollisionProfiler::default();
        profiler.prepare(&own, Point3::new(0.0, 0.0, 10.0), Point3::origin());
        let hit = profiler.test_obstruction(&rock, None).unwrap();
        assert_eq!(hit.body, ROCK);

        // Behind the wing by more than the clearance, the rock is never reached.
        let astern = body(&registry, ROCK, Point3::new(3.0, 0.0, -7.5));
        assert!(profiler.test_obstruction(&astern, None).is_none());
    }

    #[test]
    fn test_reference_point_offsets_capsule() {
        let registry = registry_with(&[CellCoord::origin()], &[CellCoord::origin()]);
        let own = body(&registry, OWN, Point3::origin());
        let mut profiler = CollisionProfiler::default();

        // Reference point 3 ahead of the centre: the centre ends 3 short of the destination.
        let capsule = *profiler
            .prepare(&own, Point3::new(0.0, 0.0, 10.0), Point3::new(0.0, 0.0, 3.0))
            .unwrap();
        assert_relative_eq!(capsule.end(), Point3::new(0.0, 0.0, 7.0), epsilon = 1e-12);
        assert_relative_eq!(capsule.radius(), 1.0);
    }

    #[test]
    fn test_zero_displacement_never_blocks() {
        let registry = registry_with(&[CellCoord::origin()], &[CellCoord::origin()]);
        let own = body(&registry, OWN, Point3::origin());
        let rock = body(&registry, ROCK, Point3::new(0.0, 0.0, 0.5));

        let mut profiler = CollisionProfiler::default();
        assert!(profiler.prepare(&own, Point3::origin(), Point3::origin()).is_none());
        assert!(profiler.test_obstruction(&rock, None).is_none());
        assert!(profiler.nearest_obstruction([&rock], None).is_none());
    }

    #[test]
    fn test_ignore_and_self_are_skipped() {
        let registry = registry_with(&[CellCoord::origin()], &[CellCoord::origin()]);
        let own = body(&registry, OWN, Point3::origin());
        let rock = body(&registry, ROCK, Point3::new(0.0, 0.0, 5.0));
        let mut profiler = CollisionProfiler::default();
        profiler.prepare(&own, Point3::new(0.0, 0.0, 10.0), Point3::origin());

        assert!(profiler.test_obstruction(&own, None).is_none());
        assert!(profiler.test_obstruction(&rock, Some(ROCK)).is_none());
    }

    #[test]
    fn test_first_hit_follows_cell_order() {
        let wall: Vec<CellCoord> =
            CellCoord::span(CellCoord::new(0, 0, 0), CellCoord::new(0, 0, 3)).collect();
        let registry = registry_with(&[CellCoord::origin()], &wall);
        let own = body(&registry, OWN, Point3::origin());
        let rock = body(&registry, ROCK, Point3::new(0.0, 0.0, 4.0));

        let mut profiler = CollisionProfiler::default();
        profiler.prepare(&own, Point3::new(0.0, 0.0, 20.0), Point3::origin());
        let hit = profiler.test_obstruction(&rock, None).unwrap();
        assert_eq!(hit.cell, CellCoord::origin());
    }

    #[test]
    fn test_nearest_obstruction_prefers_closest() {
        let registry = OccupancyRegistry::new();
        registry
            .register(BodyDescriptor::grid(OWN, 1.0), [CellCoord::origin()])
            .unwrap();
        for n in 2..=3 {
            registry
                .register(BodyDescriptor::floating(BodyId(n), 0.5), [CellCoord::origin()])
                .unwrap();
        }
        let own = body(&registry, OWN, Point3::origin());
        let far = body(&registry, BodyId(2), Point3::new(0.0, 0.0, 15.0));
        let near = body(&registry, BodyId(3), Point3::new(0.0, 0.0, 6.0));

        let mut profiler = CollisionProfiler::default();
        profiler.prepare(&own, Point3::new(0.0, 0.0, 20.0), Point3::origin());
        let hit = profiler.nearest_obstruction([&far, &near], None).unwrap();
        assert_eq!(hit.body, BodyId(3));

        let hit = profiler.nearest_obstruction([&far, &near], Some(BodyId(3))).unwrap();
        assert_eq!(hit.body, BodyId(2));
    }

    #[test]
    fn test_rotated_owner_silhouette() {
        // A long boom along local +X, yawed so it points along world +Z.
        let boom: Vec<CellCoord> =
            CellCoord::span(CellCoord::new(0, 0, 0), CellCoord::new(6, 0, 0)).collect();
        let registry = registry_with(&boom, &[CellCoord::origin()]);
        let yaw = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), -FRAC_PI_2);
        let own = ProfiledBody::from_registry(
            &registry,
            OWN,
            RigidBodyState::new(Point3::origin(), 100.0).with_orientation(yaw),
        )
        .unwrap();

        // Travelling along +X: the boom's silhouette is a line along world Z.
        let mut profiler = CollisionProfiler::default();
        profiler.prepare(&own, Point3::new(20.0, 0.0, 0.0), Point3::origin());

        let in_path = body(&registry, ROCK, Point3::new(10.0, 0.0, 5.0));
        let off_path = body(&registry, ROCK, Point3::new(10.0, 0.0, -5.0));
        assert!(profiler.test_obstruction(&in_path, None).is_some());
        assert!(profiler.test_obstruction(&off_path, None).is_none());
    }

    #[test]
    fn test_rotate_sweeps_arc() {
        // Boom along +X; yawing about +Y swings its tip from +X toward -Z.
        let boom: Vec<CellCoord> =
            CellCoord::span(CellCoord::new(0, 0, 0), CellCoord::new(6, 0, 0)).collect();
        let registry = registry_with(&boom, &[CellCoord::origin()]);
        let own = body(&registry, OWN, Point3::origin());
        let profiler = CollisionProfiler::default();
        let quarter_turn = Vector3::new(0.0, FRAC_PI_2, 0.0);

        let in_arc = body(&registry, ROCK, Point3::new(4.0, 0.0, -4.0));
        assert!(profiler.test_rotate(&own, &quarter_turn, &in_arc).is_some());

        let behind_arc = body(&registry, ROCK, Point3::new(4.0, 0.0, 4.0));
        assert!(profiler.test_rotate(&own, &quarter_turn, &behind_arc).is_none());
        assert!(profiler.test_rotate(&own, &(-quarter_turn), &behind_arc).is_some());

        let above = body(&registry, ROCK, Point3::new(4.0, 10.0, -4.0));
        assert!(profiler.test_rotate(&own, &quarter_turn, &above).is_none());
    }

    #[test]
    fn test_rotate_zero_and_far_never_block() {
        let registry = registry_with(&[CellCoord::new(3, 0, 0)], &[CellCoord::origin()]);
        let own = body(&registry, OWN, Point3::origin());
        let profiler = CollisionProfiler::default();

        let near = body(&registry, ROCK, Point3::new(3.0, 0.0, 0.5));
        assert!(profiler.test_rotate(&own, &Vector3::zeros(), &near).is_none());

        let far = body(&registry, ROCK, Point3::new(300.0, 0.0, 0.0));
        let turn = Vector3::new(0.0, 1.0, 0.0);
        assert!(profiler.test_rotate(&own, &turn, &far).is_none());
        assert!(
            profiler
                .first_rotate_obstruction(&own, &turn, [&near], Some(ROCK))
                .is_none()
        );
        assert!(profiler.first_rotate_obstruction(&own, &turn, [&near], None).is_some());
    }

    #[test]
    fn test_new_validates_config() {
        let bad = ProfilerConfig::default().with_clearance_factor(-1.0);
        assert!(CollisionProfiler::new(bad).is_err());
        assert!(CollisionProfiler::new(ProfilerConfig::default()).is_ok());
    }
}
