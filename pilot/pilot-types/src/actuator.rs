//! Actuator capability queries and the fire-and-forget command interface.
//!
//! The controller reads an [`ActuatorProfile`] once per tick and emits
//! normalized ratios through [`ActuatorCommands`]. Neither side is owned by
//! the core; the host implements both traits.

use nalgebra::{Point3, Vector2, Vector3};

/// One of the six body-local axis directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    /// Toward local +X.
    Right,
    /// Toward local -X.
    Left,
    /// Toward local +Y.
    Up,
    /// Toward local -Y.
    Down,
    /// Toward local +Z.
    Forward,
    /// Toward local -Z.
    Backward,
}

impl Direction {
    /// All six directions in axis order, positive first.
    pub const ALL: [Self; 6] = [
        Self::Right,
        Self::Left,
        Self::Up,
        Self::Down,
        Self::Forward,
        Self::Backward,
    ];

    /// Direction along `axis` (0 = X, 1 = Y, 2 = Z) with the sign of `sign`.
    ///
    /// Zero counts as positive.
    ///
    /// ```
    /// use pilot_types::Direction;
    ///
    /// assert_eq!(Direction::along(2, -3.0), Direction::Backward);
    /// assert_eq!(Direction::along(0, 0.0), Direction::Right);
    /// ```
    #[must_use]
    pub fn along(axis: usize, sign: f64) -> Self {
        let positive = sign >= 0.0;
        match (axis, positive) {
            (0, true) => Self::Right,
            (0, false) => Self::Left,
            (1, true) => Self::Up,
            (1, false) => Self::Down,
            (_, true) => Self::Forward,
            (_, false) => Self::Backward,
        }
    }

    /// Axis index of this direction.
    #[must_use]
    pub const fn axis(self) -> usize {
        match self {
            Self::Right | Self::Left => 0,
            Self::Up | Self::Down => 1,
            Self::Forward | Self::Backward => 2,
        }
    }

    /// `1.0` for positive directions, `-1.0` for negative ones.
    #[must_use]
    pub const fn sign(self) -> f64 {
        match self {
            Self::Right | Self::Up | Self::Forward => 1.0,
            Self::Left | Self::Down | Self::Backward => -1.0,
        }
    }

    /// The opposite direction.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Right => Self::Left,
            Self::Left => Self::Right,
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            Self::Forward => Self::Backward,
            Self::Backward => Self::Forward,
        }
    }

    /// Body-local unit vector.
    #[must_use]
    pub fn unit(self) -> Vector3<f64> {
        let mut v = Vector3::zeros();
        v[self.axis()] = self.sign();
        v
    }
}

/// Maximum force per body-local direction and maximum torque.
///
/// Changes as actuators are damaged or reconfigured; the controller caches a
/// copy once per tick.
///
/// # Example
///
/// ```
/// use pilot_types::{ActuatorCapability, Direction};
/// use nalgebra::Vector3;
///
/// let cap = ActuatorCapability::new(
///     Vector3::new(100.0, 200.0, 300.0),
///     Vector3::new(10.0, 20.0, 30.0),
///     50.0,
/// );
/// assert_eq!(cap.max_force(Direction::Up), 200.0);
/// assert_eq!(cap.max_force(Direction::Backward), 30.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActuatorCapability {
    /// Force available toward +X, +Y, +Z (newtons).
    positive: Vector3<f64>,
    /// Force available toward -X, -Y, -Z (newtons, non-negative).
    negative: Vector3<f64>,
    /// Maximum torque magnitude (newton-metres).
    max_torque: f64,
}

impl ActuatorCapability {
    /// Creates a capability from per-direction force magnitudes.
    ///
    /// Negative inputs are treated as zero.
    #[must_use]
    pub fn new(positive: Vector3<f64>, negative: Vector3<f64>, max_torque: f64) -> Self {
        Self {
            positive: positive.map(|f| f.max(0.0)),
            negative: negative.map(|f| f.max(0.0)),
            max_torque: max_torque.max(0.0),
        }
    }

    /// Same force in all six directions.
    #[must_use]
    pub fn uniform(force: f64, max_torque: f64) -> Self {
        let f = Vector3::repeat(force);
        Self::new(f, f, max_torque)
    }

    /// Capability with nothing available.
    #[must_use]
    pub fn none() -> Self {
        Self::new(Vector3::zeros(), Vector3::zeros(), 0.0)
    }

    /// Maximum force obtainable toward `direction`.
    #[must_use]
    pub fn max_force(&self, direction: Direction) -> f64 {
        let axis = direction.axis();
        if direction.sign() > 0.0 {
            self.positive[axis]
        } else {
            self.negative[axis]
        }
    }

    /// Maximum torque magnitude.
    #[must_use]
    pub const fn max_torque(&self) -> f64 {
        self.max_torque
    }

    /// Replaces the force available toward one direction.
    #[must_use]
    pub fn with_force(mut self, direction: Direction, force: f64) -> Self {
        let axis = direction.axis();
        if direction.sign() > 0.0 {
            self.positive[axis] = force.max(0.0);
        } else {
            self.negative[axis] = force.max(0.0);
        }
        self
    }
}

/// Read-only view of a body's actuators and the environment acting on it.
pub trait ActuatorProfile {
    /// Current actuator capability, or `None` if the actuators (or the body
    /// carrying them) no longer exist.
    fn capability(&self) -> Option<ActuatorCapability>;

    /// Constant external acceleration at `position` (world frame), e.g. gravity.
    fn environmental_bias(&self, position: &Point3<f64>) -> Vector3<f64>;
}

/// An [`ActuatorProfile`] with fixed values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedActuators {
    /// Capability reported every tick; `None` simulates destroyed actuators.
    pub capability: Option<ActuatorCapability>,
    /// Uniform environmental acceleration.
    pub bias: Vector3<f64>,
}

impl FixedActuators {
    /// Fixed capability in a zero-bias environment.
    #[must_use]
    pub fn new(capability: ActuatorCapability) -> Self {
        Self {
            capability: Some(capability),
            bias: Vector3::zeros(),
        }
    }

    /// Sets the uniform environmental acceleration.
    #[must_use]
    pub fn with_bias(mut self, bias: Vector3<f64>) -> Self {
        self.bias = bias;
        self
    }
}

impl ActuatorProfile for FixedActuators {
    fn capability(&self) -> Option<ActuatorCapability> {
        self.capability
    }

    fn environmental_bias(&self, _position: &Point3<f64>) -> Vector3<f64> {
        self.bias
    }
}

/// Normalized actuator command for one tick.
///
/// `force` is body-local with each component in `[-1, 1]`. `torque` holds the
/// pitch (about local X) and yaw (about local Y) ratios; `roll` is about local Z.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActuatorCommand {
    /// Force ratio per local axis.
    pub force: Vector3<f64>,
    /// Pitch and yaw torque ratios.
    pub torque: Vector2<f64>,
    /// Roll torque ratio.
    pub roll: f64,
}

impl ActuatorCommand {
    /// The all-zero command.
    #[must_use]
    pub fn zero() -> Self {
        Self::default()
    }

    /// Returns `true` if neither force nor torque is requested.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.force == Vector3::zeros() && self.torque == Vector2::zeros() && self.roll == 0.0
    }

    /// Returns `true` if no torque (including roll) is requested.
    #[must_use]
    pub fn is_rotation_zero(&self) -> bool {
        self.torque == Vector2::zeros() && self.roll == 0.0
    }

    /// Copy with every component clamped to `[-1, 1]`.
    #[must_use]
    pub fn clamped(&self) -> Self {
        Self {
            force: self.force.map(|r| r.clamp(-1.0, 1.0)),
            torque: self.torque.map(|r| r.clamp(-1.0, 1.0)),
            roll: self.roll.clamp(-1.0, 1.0),
        }
    }
}

/// Outgoing actuator interface. Calls are fire-and-forget.
pub trait ActuatorCommands {
    /// Applies normalized force and torque ratios.
    fn apply_force_and_torque(&mut self, force: Vector3<f64>, torque: Vector2<f64>, roll: f64);

    /// Enables or disables the host's velocity damping assistance.
    fn set_damping(&mut self, enabled: bool);

    /// Halts all actuator output.
    fn stop(&mut self);
}
