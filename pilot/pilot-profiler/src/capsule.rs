//! Swept capsule broad phase.

use nalgebra::{Point3, Unit, Vector3};

/// Lengths and squared lengths below this are treated as zero.
pub const GEOM_EPSILON: f64 = 1e-10;

/// Closest point to `p` on the segment `a`-`b`.
///
/// A degenerate segment returns `a`.
///
/// ```
/// use pilot_profiler::closest_point_segment;
/// use nalgebra::Point3;
///
/// let c = closest_point_segment(
///     Point3::origin(),
///     Point3::new(0.0, 0.0, 10.0),
///     Point3::new(3.0, 0.0, 4.0),
/// );
/// assert_eq!(c, Point3::new(0.0, 0.0, 4.0));
/// ```
#[must_use]
pub fn closest_point_segment(a: Point3<f64>, b: Point3<f64>, p: Point3<f64>) -> Point3<f64> {
    let ab = b - a;
    let ab_len_sq = ab.norm_squared();
    if ab_len_sq < GEOM_EPSILON {
        return a;
    }
    let t = ((p - a).dot(&ab) / ab_len_sq).clamp(0.0, 1.0);
    a + ab * t
}

/// Segment with a radius, covering a body's volume along its planned path.
///
/// Built once per profiler preparation and immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepCapsule {
    start: Point3<f64>,
    end: Point3<f64>,
    radius: f64,
}

impl SweepCapsule {
    /// Creates a capsule. Negative radii are treated as zero.
    #[must_use]
    pub fn new(start: Point3<f64>, end: Point3<f64>, radius: f64) -> Self {
        Self {
            start,
            end,
            radius: radius.max(0.0),
        }
    }

    /// Where the sweep begins (the owner's current centre).
    #[must_use]
    pub const fn start(&self) -> Point3<f64> {
        self.start
    }

    /// Where the sweep ends.
    #[must_use]
    pub const fn end(&self) -> Point3<f64> {
        self.end
    }

    /// Capsule radius.
    #[must_use]
    pub const fn radius(&self) -> f64 {
        self.radius
    }

    /// Segment length.
    #[must_use]
    pub fn length(&self) -> f64 {
        (self.end - self.start).norm()
    }

    /// Unit direction from start to end, or `None` for a degenerate segment.
    #[must_use]
    pub fn direction(&self) -> Option<Unit<Vector3<f64>>> {
        Unit::try_new(self.end - self.start, GEOM_EPSILON)
    }

    /// Closest point on the segment to `p`.
    #[must_use]
    pub fn closest_point(&self, p: Point3<f64>) -> Point3<f64> {
        closest_point_segment(self.start, self.end, p)
    }

    /// Squared distance from `p` to the segment.
    #[must_use]
    pub fn distance_squared(&self, p: Point3<f64>) -> f64 {
        (p - self.closest_point(p)).norm_squared()
    }

    /// Returns `true` if a sphere of radius `extra` at `p` touches the capsule.
    #[must_use]
    pub fn contains(&self, p: Point3<f64>, extra: f64) -> bool {
        let r = self.radius + extra.max(0.0);
        self.distance_squared(p) <= r * r
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn capsule() -> SweepCapsule {
        SweepCapsule::new(Point3::origin(), Point3::new(0.0, 0.0, 10.0), 2.0)
    }

    #[test]
    fn test_closest_point_clamps_to_ends() {
        let c = capsule();
        assert_relative_eq!(c.closest_point(Point3::new(1.0, 0.0, -5.0)), Point3::origin());
        assert_relative_eq!(
            c.closest_point(Point3::new(1.0, 0.0, 15.0)),
            Point3::new(0.0, 0.0, 10.0)
        );
    }

    #[test]
    fn test_contains_cylinder_and_caps() {
        let c = capsule();
        assert!(c.contains(Point3::new(2.0, 0.0, 5.0), 0.0));
        assert!(!c.contains(Point3::new(2.1, 0.0, 5.0), 0.0));
        assert!(c.contains(Point3::new(2.1, 0.0, 5.0), 0.5));
        // Hemispherical cap beyond the end.
        assert!(c.contains(Point3::new(0.0, 0.0, 11.9), 0.0));
        assert!(!c.contains(Point3::new(1.9, 0.0, 11.9), 0.0));
    }

    #[test]
    fn test_degenerate_capsule_is_a_sphere() {
        let c = SweepCapsule::new(Point3::origin(), Point3::origin(), 1.0);
        assert!(c.direction().is_none());
        assert_relative_eq!(c.length(), 0.0);
        assert!(c.contains(Point3::new(0.0, 1.0, 0.0), 0.0));
        assert!(!c.contains(Point3::new(0.0, 1.5, 0.0), 0.0));
    }

    #[test]
    fn test_direction_is_unit() {
        let dir = capsule().direction().unwrap();
        assert_relative_eq!(dir.into_inner(), Vector3::z());
    }

    #[test]
    fn test_negative_radius_clamped() {
        let c = SweepCapsule::new(Point3::origin(), Point3::new(1.0, 0.0, 0.0), -3.0);
        assert_relative_eq!(c.radius(), 0.0);
    }
}
