//! Rigid body identity, capability descriptors and kinematic snapshots.

use std::fmt;

use nalgebra::{Point3, UnitQuaternion, Vector3};

use crate::error::{PilotError, Result};

/// Stable identity of a rigid body for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BodyId(pub u64);

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BodyId({})", self.0)
    }
}

/// What kind of body this is, resolved once when the body is registered.
///
/// Structures carry a lattice of occupied cells that changes as parts are
/// added or removed. Characters and floating objects are represented by a
/// single origin cell whose size is their diameter, so every body goes
/// through the same occupancy test.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BodyKind {
    /// A body built from lattice-aligned parts.
    Grid {
        /// Edge length of one occupancy cell in world units.
        cell_size: f64,
    },
    /// A walking character.
    Character {
        /// Bounding radius in world units.
        radius: f64,
    },
    /// Any other free-floating object.
    Floating {
        /// Bounding radius in world units.
        radius: f64,
    },
}

impl BodyKind {
    /// Edge length of one occupancy cell for this body.
    ///
    /// ```
    /// use pilot_types::BodyKind;
    ///
    /// assert_eq!(BodyKind::Grid { cell_size: 2.5 }.cell_size(), 2.5);
    /// assert_eq!(BodyKind::Character { radius: 0.5 }.cell_size(), 1.0);
    /// ```
    #[must_use]
    pub const fn cell_size(&self) -> f64 {
        match *self {
            Self::Grid { cell_size } => cell_size,
            Self::Character { radius } | Self::Floating { radius } => radius * 2.0,
        }
    }

    /// Returns `true` if the body receives structural-change notifications.
    #[must_use]
    pub const fn is_structure(&self) -> bool {
        matches!(self, Self::Grid { .. })
    }

    /// Validates the descriptor's size parameter.
    ///
    /// # Errors
    ///
    /// Returns [`PilotError::InvalidCellSize`] if the derived cell size is not
    /// positive and finite.
    pub fn validate(&self) -> Result<()> {
        let size = self.cell_size();
        if !size.is_finite() || size <= 0.0 {
            return Err(PilotError::InvalidCellSize(size));
        }
        Ok(())
    }
}

/// Identity plus capability descriptor of a registered body.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BodyDescriptor {
    /// Body identity.
    pub id: BodyId,
    /// Body kind.
    pub kind: BodyKind,
}

impl BodyDescriptor {
    /// Creates a descriptor for a lattice-built body.
    #[must_use]
    pub const fn grid(id: BodyId, cell_size: f64) -> Self {
        Self {
            id,
            kind: BodyKind::Grid { cell_size },
        }
    }

    /// Creates a descriptor for a character.
    #[must_use]
    pub const fn character(id: BodyId, radius: f64) -> Self {
        Self {
            id,
            kind: BodyKind::Character { radius },
        }
    }

    /// Creates a descriptor for a free-floating object.
    #[must_use]
    pub const fn floating(id: BodyId, radius: f64) -> Self {
        Self {
            id,
            kind: BodyKind::Floating { radius },
        }
    }

    /// Cell size of the described body.
    #[must_use]
    pub const fn cell_size(&self) -> f64 {
        self.kind.cell_size()
    }
}

/// Kinematic snapshot of a rigid body, read once per tick.
///
/// `position` is the body origin, which is also the centre of the occupancy
/// lattice. Velocities are in world space.
///
/// # Example
///
/// ```
/// use pilot_types::RigidBodyState;
/// use nalgebra::{Point3, Vector3};
///
/// let state = RigidBodyState::new(Point3::origin(), 1000.0)
///     .with_linear_velocity(Vector3::new(0.0, 0.0, 5.0));
/// assert_eq!(state.speed(), 5.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RigidBodyState {
    /// World position of the body origin.
    pub position: Point3<f64>,
    /// World orientation of the body frame.
    pub orientation: UnitQuaternion<f64>,
    /// World linear velocity.
    pub linear_velocity: Vector3<f64>,
    /// World angular velocity (axis times rad/s).
    pub angular_velocity: Vector3<f64>,
    /// Mass in kilograms.
    pub mass: f64,
    /// Scalar moment-of-inertia proxy (kg·m²).
    pub inertia: f64,
}

impl RigidBodyState {
    /// Creates an at-rest, identity-oriented body.
    ///
    /// The inertia proxy defaults to the mass (unit radius of gyration).
    #[must_use]
    pub fn new(position: Point3<f64>, mass: f64) -> Self {
        Self {
            position,
            orientation: UnitQuaternion::identity(),
            linear_velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
            mass,
            inertia: mass,
        }
    }

    /// Sets the orientation.
    #[must_use]
    pub fn with_orientation(mut self, orientation: UnitQuaternion<f64>) -> Self {
        self.orientation = orientation;
        self
    }

    /// Sets the world linear velocity.
    #[must_use]
    pub fn with_linear_velocity(mut self, velocity: Vector3<f64>) -> Self {
        self.linear_velocity = velocity;
        self
    }

    /// Sets the world angular velocity.
    #[must_use]
    pub fn with_angular_velocity(mut self, velocity: Vector3<f64>) -> Self {
        self.angular_velocity = velocity;
        self
    }

    /// Sets the inertia proxy.
    #[must_use]
    pub fn with_inertia(mut self, inertia: f64) -> Self {
        self.inertia = inertia;
        self
    }

    /// Linear speed.
    #[must_use]
    pub fn speed(&self) -> f64 {
        self.linear_velocity.norm()
    }

    /// Rotates a world vector into the body frame.
    #[must_use]
    pub fn to_local(&self, world: &Vector3<f64>) -> Vector3<f64> {
        self.orientation.inverse_transform_vector(world)
    }

    /// Rotates a body-frame vector into world space.
    #[must_use]
    pub fn to_world(&self, local: &Vector3<f64>) -> Vector3<f64> {
        self.orientation.transform_vector(local)
    }

    /// World position of a body-local offset from the origin.
    #[must_use]
    pub fn local_point_to_world(&self, local: &Vector3<f64>) -> Point3<f64> {
        self.position + self.to_world(local)
    }

    /// Validates mass and inertia.
    ///
    /// # Errors
    ///
    /// Returns [`PilotError::InvalidMass`] if the mass or inertia proxy is not
    /// positive and finite.
    pub fn validate(&self) -> Result<()> {
        if !self.mass.is_finite() || self.mass <= 0.0 {
            return Err(PilotError::InvalidMass(self.mass));
        }
        if !self.inertia.is_finite() || self.inertia <= 0.0 {
            return Err(PilotError::InvalidMass(self.inertia));
        }
        Ok(())
    }
}

/// Another body visible to the controller this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbour {
    /// Body identity, used to look up occupancy.
    pub id: BodyId,
    /// Kinematic snapshot.
    pub state: RigidBodyState,
}

impl Neighbour {
    /// Creates a neighbour entry.
    #[must_use]
    pub const fn new(id: BodyId, state: RigidBodyState) -> Self {
        Self { id, state }
    }
}
