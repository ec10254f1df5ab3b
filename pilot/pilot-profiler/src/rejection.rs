//! Vector rejection onto the plane orthogonal to travel.
//!
//! Projecting both bodies onto this plane turns "will the sweep hit it" into a
//! 2-D proximity query against the owner's silhouette.

use hashbrown::HashMap;
use nalgebra::{Unit, Vector2, Vector3};

/// Component of `v` orthogonal to `direction`.
///
/// ```
/// use pilot_profiler::reject;
/// use nalgebra::Vector3;
///
/// let r = reject(&Vector3::new(1.0, 2.0, 3.0), &Vector3::z_axis());
/// assert_eq!(r, Vector3::new(1.0, 2.0, 0.0));
/// ```
#[must_use]
pub fn reject(v: &Vector3<f64>, direction: &Unit<Vector3<f64>>) -> Vector3<f64> {
    let d = direction.into_inner();
    v - d * v.dot(&d)
}

/// Orthonormal 2-D frame on the plane orthogonal to a direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RejectionPlane {
    normal: Unit<Vector3<f64>>,
    u: Vector3<f64>,
    w: Vector3<f64>,
}

impl RejectionPlane {
    /// Builds the plane orthogonal to `normal`.
    #[must_use]
    pub fn new(normal: Unit<Vector3<f64>>) -> Self {
        let helper = if normal.x.abs() < 0.9 {
            Vector3::x()
        } else {
            Vector3::y()
        };
        let u = reject(&helper, &normal).normalize();
        let w = normal.cross(&u);
        Self { normal, u, w }
    }

    /// Plane normal (the travel direction).
    #[must_use]
    pub const fn normal(&self) -> &Unit<Vector3<f64>> {
        &self.normal
    }

    /// Signed distance of `v` along the normal.
    #[must_use]
    pub fn axial(&self, v: &Vector3<f64>) -> f64 {
        v.dot(&self.normal.into_inner())
    }

    /// In-plane coordinates of the rejection of `v`.
    #[must_use]
    pub fn project(&self, v: &Vector3<f64>) -> Vector2<f64> {
        Vector2::new(v.dot(&self.u), v.dot(&self.w))
    }

    /// Angle of `v` around the normal, measured from the plane's first axis
    /// in the right-handed sense.
    #[must_use]
    pub fn azimuth(&self, v: &Vector3<f64>) -> f64 {
        v.dot(&self.w).atan2(v.dot(&self.u))
    }
}

/// Bucketed set of projected owner cells.
///
/// Buckets are one owner cell wide, so a query only visits the buckets its
/// search radius can reach.
#[derive(Debug, Clone, Default)]
pub struct Silhouette {
    bucket: f64,
    buckets: HashMap<(i64, i64), Vec<Vector2<f64>>>,
    len: usize,
}

impl Silhouette {
    /// Creates an empty silhouette with the given bucket width.
    #[must_use]
    pub fn new(bucket: f64) -> Self {
        Self {
            bucket: bucket.max(f64::EPSILON),
            buckets: HashMap::new(),
            len: 0,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn key(&self, p: &Vector2<f64>) -> (i64, i64) {
        (
            (p.x / self.bucket).floor() as i64,
            (p.y / self.bucket).floor() as i64,
        )
    }

    /// Adds a projected point.
    pub fn insert(&mut self, p: Vector2<f64>) {
        let key = self.key(&p);
        self.buckets.entry(key).or_default().push(p);
        self.len += 1;
    }

    /// Number of points.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no point was inserted.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns `true` if some point lies strictly closer than `sqrt(threshold_sq)` to `p`.
    #[must_use]
    pub fn any_within(&self, p: &Vector2<f64>, threshold_sq: f64) -> bool {
        if self.is_empty() || threshold_sq <= 0.0 {
            return false;
        }
        #[allow(clippy::cast_possible_truncation)]
        let reach = (threshold_sq.sqrt() / self.bucket).ceil() as i64;
        let (kx, ky) = self.key(p);
        for dx in -reach..=reach {
            for dy in -reach..=reach {
                let Some(points) = self.buckets.get(&(kx + dx, ky + dy)) else {
                    continue;
                };
                if points.iter().any(|q| (q - p).norm_squared() < threshold_sq) {
                    return true;
                }
            }
        }
        false
    }
}
