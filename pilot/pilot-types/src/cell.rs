//! Integer lattice coordinates for occupancy cells.

use std::fmt;

use nalgebra::Vector3;

/// A discrete cell on a body's occupancy lattice.
///
/// Coordinates are body-local and scaled by the body's cell size. Cell
/// `(0, 0, 0)` is centred on the body's origin.
///
/// # Example
///
/// ```
/// use pilot_types::CellCoord;
/// use nalgebra::Vector3;
///
/// let cell = CellCoord::new(1, -2, 3);
/// assert_eq!(cell.local_position(2.5), Vector3::new(2.5, -5.0, 7.5));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellCoord {
    /// X coordinate (right axis).
    pub x: i32,
    /// Y coordinate (up axis).
    pub y: i32,
    /// Z coordinate (forward axis).
    pub z: i32,
}

impl CellCoord {
    /// Creates a new cell coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The cell containing the body origin.
    #[must_use]
    pub const fn origin() -> Self {
        Self::new(0, 0, 0)
    }

    /// Returns the coordinate as an array.
    #[must_use]
    pub const fn as_array(self) -> [i32; 3] {
        [self.x, self.y, self.z]
    }

    /// Converts to a floating-point lattice vector (unscaled).
    #[must_use]
    pub fn to_vector(self) -> Vector3<f64> {
        Vector3::new(f64::from(self.x), f64::from(self.y), f64::from(self.z))
    }

    /// Body-local position of the cell centre for the given cell size.
    #[must_use]
    pub fn local_position(self, cell_size: f64) -> Vector3<f64> {
        self.to_vector() * cell_size
    }

    /// Squared lattice distance from the origin cell.
    #[must_use]
    pub const fn length_squared(self) -> i64 {
        let (x, y, z) = (self.x as i64, self.y as i64, self.z as i64);
        x * x + y * y + z * z
    }

    /// Iterates every cell in the inclusive box `min..=max`.
    ///
    /// Handy for describing block-shaped parts.
    ///
    /// ```
    /// use pilot_types::CellCoord;
    ///
    /// let cells: Vec<_> = CellCoord::span(CellCoord::new(0, 0, 0), CellCoord::new(1, 0, 1)).collect();
    /// assert_eq!(cells.len(), 4);
    /// ```
    pub fn span(min: Self, max: Self) -> impl Iterator<Item = Self> {
        (min.x..=max.x).flat_map(move |x| {
            (min.y..=max.y).flat_map(move |y| (min.z..=max.z).map(move |z| Self::new(x, y, z)))
        })
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

impl From<[i32; 3]> for CellCoord {
    fn from(v: [i32; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}
