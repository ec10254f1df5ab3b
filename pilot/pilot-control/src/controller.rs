//! The per-tick motion controller.

use std::sync::Arc;

use nalgebra::{Point3, Unit, UnitQuaternion, Vector2, Vector3};
use pilot_occupancy::OccupancyRegistry;
use pilot_profiler::{CollisionProfiler, Obstruction, ProfiledBody, reject};
use pilot_types::{
    ActuatorCapability, ActuatorCommand, ActuatorCommands, ActuatorProfile, BodyId,
    ControllerConfig, Direction, NavSettings, Neighbour, ProfilerConfig, Result, RigidBodyState,
};
use tracing::{debug, info, trace, warn};

use crate::calibration::TorqueCalibrator;
use crate::fallback::{
    FallbackMonitor, FallbackState, Measure, OverworkMonitor, Progress, ProgressTracker,
    holding_saturation,
};
use crate::latch::{CommandLatch, LatchAction};
use crate::stopping::{axis_speed_limits, clamp_norm, max_stopping_speed, speed_along};

/// Vectors shorter than this count as zero-length directions.
const DIRECTION_EPSILON: f64 = 1e-9;

/// Smallest distance change of the destination that restarts progress tracking (m).
const MIN_ANCHOR_SHIFT: f64 = 1.0;

/// Everything the host supplies for one control tick.
#[derive(Clone, Copy)]
pub struct TickFrame<'a> {
    /// Monotonic tick counter.
    pub tick: u64,
    /// The controlled body's kinematic snapshot.
    pub body: RigidBodyState,
    /// Actuator and environment queries for the controlled body.
    pub actuators: &'a dyn ActuatorProfile,
    /// Bodies that may obstruct motion this tick.
    pub neighbours: &'a [Neighbour],
}

impl<'a> TickFrame<'a> {
    /// Creates a frame with no neighbours.
    #[must_use]
    pub fn new(tick: u64, body: RigidBodyState, actuators: &'a dyn ActuatorProfile) -> Self {
        Self {
            tick,
            body,
            actuators,
            neighbours: &[],
        }
    }

    /// Sets the neighbours considered for collision avoidance.
    #[must_use]
    pub fn with_neighbours(mut self, neighbours: &'a [Neighbour]) -> Self {
        self.neighbours = neighbours;
        self
    }
}

/// Where to move, for [`MotionController::compute_move`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveRequest {
    /// The point on the body that should arrive (world).
    pub reference_point: Point3<f64>,
    /// Where it should arrive (world).
    pub destination: Point3<f64>,
    /// Velocity of the destination, for intercepting moving targets.
    pub destination_velocity: Vector3<f64>,
    /// Slow down progressively on the final approach.
    pub landing: bool,
}

impl MoveRequest {
    /// Move `reference_point` to a stationary `destination`.
    #[must_use]
    pub fn new(reference_point: Point3<f64>, destination: Point3<f64>) -> Self {
        Self {
            reference_point,
            destination,
            destination_velocity: Vector3::zeros(),
            landing: false,
        }
    }

    /// Sets the destination's velocity.
    #[must_use]
    pub fn with_destination_velocity(mut self, velocity: Vector3<f64>) -> Self {
        self.destination_velocity = velocity;
        self
    }

    /// Enables or disables the landing speed limit.
    #[must_use]
    pub fn with_landing(mut self, landing: bool) -> Self {
        self.landing = landing;
        self
    }
}

/// Result of [`MotionController::compute_move`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MoveOutcome {
    /// A force command toward the destination is pending.
    Moving {
        /// World-space target velocity.
        target_velocity: Vector3<f64>,
    },
    /// The reference point is within the destination radius; the pending
    /// force only matches the destination's velocity.
    Arrived,
    /// The sweep hits another body; no force is commanded.
    Blocked(Obstruction),
    /// Actuator or occupancy data is missing; no force is commanded.
    NoData,
}

/// A moving body to keep facing, for feed-forward rotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetBody {
    /// World position.
    pub position: Point3<f64>,
    /// World linear velocity.
    pub velocity: Vector3<f64>,
}

/// Desired facing, for [`MotionController::compute_rotate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotateRequest {
    /// World orientation of the part whose forward (+Z) should face `direction`.
    pub reference_orientation: UnitQuaternion<f64>,
    /// World direction to face.
    pub direction: Vector3<f64>,
    /// World direction the reference part's up (+Y) should align with.
    pub up: Option<Vector3<f64>>,
    /// Moving body being tracked.
    pub target: Option<TargetBody>,
    /// Track precisely instead of merely facing: skips the linear stopping cap.
    pub fast: bool,
}

impl RotateRequest {
    /// Face `direction` with the given reference part.
    #[must_use]
    pub const fn new(reference_orientation: UnitQuaternion<f64>, direction: Vector3<f64>) -> Self {
        Self {
            reference_orientation,
            direction,
            up: None,
            target: None,
            fast: false,
        }
    }

    /// Also align roll with `up`.
    #[must_use]
    pub const fn with_up(mut self, up: Vector3<f64>) -> Self {
        self.up = Some(up);
        self
    }

    /// Adds feed-forward for a moving target.
    #[must_use]
    pub const fn with_target(mut self, target: TargetBody) -> Self {
        self.target = Some(target);
        self
    }

    /// Enables precise tracking.
    #[must_use]
    pub const fn fast(mut self) -> Self {
        self.fast = true;
        self
    }
}

/// Result of [`MotionController::compute_rotate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RotateOutcome {
    /// Turning toward the requested facing.
    Rotating {
        /// Remaining angular error (body frame, pitch/yaw/roll radians).
        error: Vector3<f64>,
    },
    /// Within the angle tolerance; residual angular velocity is being damped.
    Aligned,
    /// Actuators are overworked; leveling against the environmental bias.
    Leveling,
    /// The rotation would swing into another body.
    Blocked {
        /// What would be hit.
        obstruction: Obstruction,
        /// `true` if a leveling rotation replaced the request, `false` if the
        /// previous torque command was kept.
        leveling: bool,
    },
    /// The requested direction had zero length; no torque is commanded.
    Idle,
    /// Actuator or occupancy data is missing; no torque is commanded.
    NoData,
}

/// Converts a body-local acceleration into force ratios.
///
/// Returns the ratios and, per axis, whether damping assistance should take
/// over. An axis is handed to damping when its ratio would exceed unit
/// magnitude while the body's velocity opposes the requested force.
///
/// ```
/// use pilot_control::force_ratio;
/// use pilot_types::ActuatorCapability;
/// use nalgebra::Vector3;
///
/// let cap = ActuatorCapability::uniform(2000.0, 1.0);
/// let (ratio, damping) = force_ratio(&cap, 1000.0, &Vector3::zeros(), &Vector3::new(0.0, 0.0, 1.0));
/// assert_eq!(ratio, Vector3::new(0.0, 0.0, 0.5));
/// assert_eq!(damping, [false; 3]);
/// ```
#[must_use]
pub fn force_ratio(
    capability: &ActuatorCapability,
    mass: f64,
    velocity_local: &Vector3<f64>,
    accel_local: &Vector3<f64>,
) -> (Vector3<f64>, [bool; 3]) {
    let mut damping = [false; 3];
    let ratio = Vector3::from_fn(|i, _| {
        let accel = accel_local[i];
        if accel == 0.0 {
            return 0.0;
        }
        let available = capability
            .max_force(Direction::along(i, accel))
            .max(f64::EPSILON);
        let ratio = accel * mass / available;
        if ratio.abs() > 1.0 && velocity_local[i] * ratio < 0.0 {
            damping[i] = true;
            0.0
        } else {
            ratio.clamp(-1.0, 1.0)
        }
    });
    (ratio, damping)
}

/// Line-of-sight angular velocity (world) that keeps a moving target in view.
///
/// Uses the small-angle form `atan2(lateral relative speed, distance)` about
/// the axis perpendicular to the line of sight and the lateral motion.
#[must_use]
pub fn feed_forward_rate(body: &RigidBodyState, target: &TargetBody) -> Vector3<f64> {
    let line_of_sight = target.position - body.position;
    let distance = line_of_sight.norm();
    let Some(los) = Unit::try_new(line_of_sight, DIRECTION_EPSILON) else {
        return Vector3::zeros();
    };
    let lateral = reject(&(target.velocity - body.linear_velocity), &los);
    let lateral_speed = lateral.norm();
    if lateral_speed < DIRECTION_EPSILON {
        return Vector3::zeros();
    }
    let axis = los.cross(&lateral) / lateral_speed;
    axis * lateral_speed.atan2(distance)
}

/// Motion controller for one body.
///
/// Each tick the host calls [`compute_move`](Self::compute_move) and/or
/// [`compute_rotate`](Self::compute_rotate) with the same [`TickFrame`], then
/// [`apply`](Self::apply) to emit the resulting command. Collision avoidance
/// consults the shared [`OccupancyRegistry`]; missing data never aborts a
/// tick, it degrades to a zero command and a single stop.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use pilot_control::{MotionController, MoveOutcome, MoveRequest, TickFrame};
/// use pilot_occupancy::OccupancyRegistry;
/// use pilot_types::{
///     ActuatorCapability, BodyDescriptor, BodyId, CellCoord, ControllerConfig, FixedActuators,
///     NavSettings, RigidBodyState,
/// };
/// use nalgebra::Point3;
///
/// let registry = Arc::new(OccupancyRegistry::new());
/// registry.register(BodyDescriptor::grid(BodyId(1), 2.5), [CellCoord::origin()]).unwrap();
///
/// let mut controller =
///     MotionController::new(BodyId(1), Arc::clone(&registry), ControllerConfig::default()).unwrap();
/// controller.set_nav_settings(NavSettings::default().with_speed_target(10.0)).unwrap();
///
/// let actuators = FixedActuators::new(ActuatorCapability::uniform(2000.0, 500.0));
/// let body = RigidBodyState::new(Point3::origin(), 1000.0);
/// let frame = TickFrame::new(0, body, &actuators);
///
/// let outcome = controller.compute_move(
///     &frame,
///     &MoveRequest::new(Point3::origin(), Point3::new(0.0, 0.0, 100.0)),
/// );
/// let MoveOutcome::Moving { target_velocity } = outcome else { panic!("{outcome:?}") };
/// assert!(target_velocity.norm() <= 10.0 + 1e-9);
/// assert!(target_velocity.z > 0.0);
/// ```
pub struct MotionController {
    id: BodyId,
    registry: Arc<OccupancyRegistry>,
    config: ControllerConfig,
    nav: NavSettings,
    profiler: CollisionProfiler,
    ignore: Option<BodyId>,

    tick: Option<u64>,
    capability: Option<ActuatorCapability>,
    bias: Vector3<f64>,
    body_valid: bool,

    pending: ActuatorCommand,
    damping_axes: [bool; 3],
    damping_applied: Option<bool>,
    latch: CommandLatch,

    calibrator: TorqueCalibrator,
    distance: ProgressTracker,
    angle: ProgressTracker,
    anchor: Option<Point3<f64>>,
    overwork: OverworkMonitor,
    fallback: FallbackMonitor,
    travel: Option<Unit<Vector3<f64>>>,

    move_obstruction: Option<Obstruction>,
    rotate_obstruction: Option<Obstruction>,
}

impl MotionController {
    /// Creates a controller for body `id`.
    ///
    /// # Errors
    ///
    /// Returns [`pilot_types::PilotError::InvalidConfig`] if `config` is invalid.
    pub fn new(
        id: BodyId,
        registry: Arc<OccupancyRegistry>,
        config: ControllerConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            id,
            registry,
            config,
            nav: NavSettings::default(),
            profiler: CollisionProfiler::default(),
            ignore: None,
            tick: None,
            capability: None,
            bias: Vector3::zeros(),
            body_valid: false,
            pending: ActuatorCommand::zero(),
            damping_axes: [false; 3],
            damping_applied: None,
            latch: CommandLatch::new(),
            calibrator: TorqueCalibrator::new(&config),
            distance: ProgressTracker::new(config.stuck_ticks, config.progress_epsilon),
            angle: ProgressTracker::new(config.stuck_ticks, config.angle_epsilon),
            anchor: None,
            overwork: OverworkMonitor::new(config.overwork_ratio, config.overwork_hysteresis),
            fallback: FallbackMonitor::new(),
            travel: None,
            move_obstruction: None,
            rotate_obstruction: None,
        })
    }

    /// Replaces the profiler configuration.
    ///
    /// # Errors
    ///
    /// Returns [`pilot_types::PilotError::InvalidConfig`] if `config` is invalid.
    pub fn with_profiler_config(mut self, config: ProfilerConfig) -> Result<Self> {
        self.profiler = CollisionProfiler::new(config)?;
        Ok(self)
    }

    /// Controlled body.
    #[must_use]
    pub const fn id(&self) -> BodyId {
        self.id
    }

    /// Controller configuration.
    #[must_use]
    pub const fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Current navigation settings.
    #[must_use]
    pub const fn nav_settings(&self) -> &NavSettings {
        &self.nav
    }

    /// Installs this tick's navigation settings.
    ///
    /// # Errors
    ///
    /// Returns [`pilot_types::PilotError::InvalidConfig`] and keeps the previous
    /// settings if `nav` is invalid.
    pub fn set_nav_settings(&mut self, nav: NavSettings) -> Result<()> {
        nav.validate()?;
        self.nav = nav;
        Ok(())
    }

    /// Excludes a body (typically one the reference part is attached to)
    /// from obstruction tests.
    pub fn set_ignored_body(&mut self, body: Option<BodyId>) {
        self.ignore = body;
    }

    /// The collision profiler, with the last prepared sweep.
    #[must_use]
    pub const fn profiler(&self) -> &CollisionProfiler {
        &self.profiler
    }

    /// Command that [`apply`](Self::apply) would emit.
    #[must_use]
    pub fn command(&self) -> ActuatorCommand {
        self.pending.clamped()
    }

    /// Returns `true` if damping assistance is requested this tick.
    #[must_use]
    pub fn damping(&self) -> bool {
        self.damping_axes.iter().any(|&d| d)
    }

    /// Axes on which damping assistance replaced the force command.
    #[must_use]
    pub const fn damping_axes(&self) -> [bool; 3] {
        self.damping_axes
    }

    /// Progress state.
    #[must_use]
    pub fn fallback_state(&self) -> FallbackState {
        self.fallback.state()
    }

    /// Returns `true` while no progress is being made.
    #[must_use]
    pub fn is_stuck(&self) -> bool {
        self.fallback.state() == FallbackState::Stuck
    }

    /// Returns `true` while actuators are overworked.
    #[must_use]
    pub const fn is_overworked(&self) -> bool {
        self.overwork.is_overworked()
    }

    /// Current angular acceleration estimate at full torque ratio.
    #[must_use]
    pub fn torque_estimate(&self) -> f64 {
        self.calibrator.estimate()
    }

    /// Last obstruction found for a translation.
    #[must_use]
    pub const fn move_obstruction(&self) -> Option<Obstruction> {
        self.move_obstruction
    }

    /// Last obstruction found for a rotation.
    #[must_use]
    pub const fn rotate_obstruction(&self) -> Option<Obstruction> {
        self.rotate_obstruction
    }

    fn begin_tick(&mut self, frame: &TickFrame<'_>) {
        if self.tick == Some(frame.tick) {
            return;
        }
        self.tick = Some(frame.tick);
        self.pending = ActuatorCommand::zero();
        self.damping_axes = [false; 3];
        self.capability = frame.actuators.capability();
        self.bias = frame.actuators.environmental_bias(&frame.body.position);
        self.body_valid = match frame.body.validate() {
            Ok(()) => true,
            Err(err) => {
                warn!(body = %self.id, %err, "Rejecting body state");
                false
            }
        };

        let Some(capability) = self.usable_capability() else {
            return;
        };
        self.calibrator
            .seed(capability.max_torque() / frame.body.inertia);
        let saturation = holding_saturation(
            &capability,
            &frame.body.to_local(&self.bias),
            frame.body.mass,
        );
        if let Some(overworked) = self.overwork.update(saturation) {
            info!(body = %self.id, overworked, saturation, "Overwork state changed");
        }
    }

    fn usable_capability(&self) -> Option<ActuatorCapability> {
        if self.body_valid { self.capability } else { None }
    }

    fn advance_fallback(&mut self, measure: Measure, progress: Progress, value: f64) {
        if let Some(state) = self.fallback.observe(measure, progress) {
            info!(body = %self.id, %state, %measure, value, "Fallback state changed");
        }
    }

    fn settle_fallback(&mut self, measure: Measure) {
        if let Some(state) = self.fallback.settle(measure) {
            info!(body = %self.id, %state, %measure, "Fallback state changed on reaching goal");
        }
    }

    fn candidates(&self, frame: &TickFrame<'_>) -> Vec<ProfiledBody> {
        frame
            .neighbours
            .iter()
            .filter(|n| n.id != self.id)
            .filter_map(|n| match ProfiledBody::from_registry(&self.registry, n.id, n.state) {
                Ok(body) => Some(body),
                Err(err) => {
                    trace!(body = %n.id, %err, "No occupancy for neighbour");
                    None
                }
            })
            .collect()
    }

    /// Computes the force command for moving `request.reference_point` onto
    /// `request.destination`.
    ///
    /// Call at most once per tick.
    pub fn compute_move(&mut self, frame: &TickFrame<'_>, request: &MoveRequest) -> MoveOutcome {
        self.begin_tick(frame);
        self.pending.force = Vector3::zeros();
        self.damping_axes = [false; 3];

        let Some(capability) = self.usable_capability() else {
            warn!(body = %self.id, tick = frame.tick, "No actuator data, holding still");
            self.move_obstruction = None;
            return MoveOutcome::NoData;
        };
        let body = frame.body;

        let anchor_shift = self.nav.destination_radius.max(MIN_ANCHOR_SHIFT);
        if self
            .anchor
            .is_none_or(|anchor| (request.destination - anchor).norm() > anchor_shift)
        {
            self.distance.reset();
            self.anchor = Some(request.destination);
        }

        let displacement = request.destination - request.reference_point;
        let distance = displacement.norm();
        let direction = Unit::try_new(displacement, DIRECTION_EPSILON);
        let Some(direction) = direction.filter(|_| distance > self.nav.destination_radius) else {
            self.distance.reset();
            self.settle_fallback(Measure::Distance);
            self.move_obstruction = None;
            let target = clamp_norm(request.destination_velocity, self.nav.speed_target);
            self.command_force(&capability, &body, &target);
            return MoveOutcome::Arrived;
        };
        self.travel = Some(direction);

        let progress = self.distance.observe(distance);
        self.advance_fallback(Measure::Distance, progress, distance);

        if self.nav.collision_avoidance {
            match self.find_move_obstruction(frame, request) {
                Ok(Some(obstruction)) => {
                    if self.move_obstruction.map(|o| o.body) == Some(obstruction.body) {
                        debug!(body = %self.id, obstruction = %obstruction.body, "Move still blocked");
                    } else {
                        warn!(
                            body = %self.id,
                            obstruction = %obstruction.body,
                            x = obstruction.point.x,
                            y = obstruction.point.y,
                            z = obstruction.point.z,
                            "Move blocked"
                        );
                    }
                    self.move_obstruction = Some(obstruction);
                    return MoveOutcome::Blocked(obstruction);
                }
                Ok(None) => self.move_obstruction = None,
                Err(err) => {
                    warn!(body = %self.id, %err, "No occupancy data, holding still");
                    self.move_obstruction = None;
                    return MoveOutcome::NoData;
                }
            }
        }

        let target_velocity =
            self.target_velocity(&capability, &body, request, direction, distance);
        self.command_force(&capability, &body, &target_velocity);
        MoveOutcome::Moving { target_velocity }
    }

    fn find_move_obstruction(
        &mut self,
        frame: &TickFrame<'_>,
        request: &MoveRequest,
    ) -> Result<Option<Obstruction>> {
        let own = ProfiledBody::from_registry(&self.registry, self.id, frame.body)?;
        let candidates = self.candidates(frame);
        self.profiler
            .prepare(&own, request.destination, request.reference_point);
        Ok(self.profiler.nearest_obstruction(&candidates, self.ignore))
    }

    fn target_velocity(
        &self,
        capability: &ActuatorCapability,
        body: &RigidBodyState,
        request: &MoveRequest,
        direction: Unit<Vector3<f64>>,
        distance: f64,
    ) -> Vector3<f64> {
        let local_direction = Unit::new_normalize(body.to_local(&direction));
        let local = local_direction.into_inner() * distance;
        let bias_local = body.to_local(&self.bias);

        // Braking opposes travel on each axis; the bias helps or hinders it.
        let braking = Vector3::from_fn(|i, _| {
            let brake = Direction::along(i, -local[i]);
            let accel = capability.max_force(brake) / body.mass + bias_local[i] * brake.sign();
            accel.max(0.0)
        });
        let limits = axis_speed_limits(&local, &braking, &self.config);

        let mut relative_cap = self.nav.speed_max_relative;
        if request.landing {
            let landing = (distance * self.config.landing_speed_gain)
                .max(self.config.landing_speed_floor);
            relative_cap = relative_cap.min(landing);
        }
        let speed = speed_along(&limits, &local_direction).min(relative_cap);

        let approach = direction.into_inner() * speed;
        clamp_norm(approach + request.destination_velocity, self.nav.speed_target)
    }

    fn command_force(
        &mut self,
        capability: &ActuatorCapability,
        body: &RigidBodyState,
        target_velocity: &Vector3<f64>,
    ) {
        let velocity_local = body.to_local(&body.linear_velocity);
        let accel_local = body.to_local(&(target_velocity - body.linear_velocity - self.bias));
        let (ratio, damping) = force_ratio(capability, body.mass, &velocity_local, &accel_local);
        self.pending.force = ratio;
        self.damping_axes = damping;
    }

    /// Computes the torque command for turning toward `request.direction`.
    ///
    /// Call at most once per tick.
    pub fn compute_rotate(
        &mut self,
        frame: &TickFrame<'_>,
        request: &RotateRequest,
    ) -> RotateOutcome {
        self.begin_tick(frame);
        let previous = self.latch.last();
        self.pending.torque = Vector2::zeros();
        self.pending.roll = 0.0;

        if self.usable_capability().is_none() {
            warn!(body = %self.id, tick = frame.tick, "No actuator data, not rotating");
            self.rotate_obstruction = None;
            return RotateOutcome::NoData;
        }
        let body = frame.body;
        let omega_local = body.to_local(&body.angular_velocity);
        self.calibrator.observe(frame.tick, omega_local);

        if self.overwork.is_overworked() {
            self.level(&body, &omega_local, &previous);
            return RotateOutcome::Leveling;
        }

        let Some(error) = orientation_error(&body, request) else {
            debug!(body = %self.id, "Zero-length facing direction");
            self.angle.reset();
            return RotateOutcome::Idle;
        };
        let magnitude = error.norm();
        let aligned = magnitude <= self.config.angle_epsilon;
        if aligned {
            self.angle.reset();
            self.settle_fallback(Measure::Angle);
        } else {
            let progress = self.angle.observe(magnitude);
            self.advance_fallback(Measure::Angle, progress, magnitude);
        }

        if self.nav.collision_avoidance && !aligned {
            let displacement = body.to_world(&error);
            match self.find_rotate_obstruction(frame, &displacement) {
                Ok(Some(obstruction)) => {
                    warn!(
                        body = %self.id,
                        obstruction = %obstruction.body,
                        angle = magnitude,
                        "Rotation blocked"
                    );
                    self.rotate_obstruction = Some(obstruction);
                    let leveling = self.level(&body, &omega_local, &previous);
                    return RotateOutcome::Blocked {
                        obstruction,
                        leveling,
                    };
                }
                Ok(None) => self.rotate_obstruction = None,
                Err(err) => {
                    warn!(body = %self.id, %err, "No occupancy data, not rotating");
                    self.rotate_obstruction = None;
                    return RotateOutcome::NoData;
                }
            }
        }

        let feed_forward = request
            .target
            .map_or_else(Vector3::zeros, |t| body.to_local(&feed_forward_rate(&body, &t)));
        self.command_rotation(&error, &omega_local, &feed_forward, request.fast);

        if aligned {
            RotateOutcome::Aligned
        } else {
            RotateOutcome::Rotating { error }
        }
    }

    fn find_rotate_obstruction(
        &self,
        frame: &TickFrame<'_>,
        displacement: &Vector3<f64>,
    ) -> Result<Option<Obstruction>> {
        let own = ProfiledBody::from_registry(&self.registry, self.id, frame.body)?;
        let candidates = self.candidates(frame);
        Ok(self
            .profiler
            .first_rotate_obstruction(&own, displacement, &candidates, self.ignore))
    }

    /// Turns the body's up axis against the environmental bias. Without a
    /// bias there is nothing to level against and the previous torque is kept.
    fn level(
        &mut self,
        body: &RigidBodyState,
        omega_local: &Vector3<f64>,
        previous: &ActuatorCommand,
    ) -> bool {
        let Some(up) = Unit::try_new(-self.bias, DIRECTION_EPSILON) else {
            self.pending.torque = previous.torque;
            self.pending.roll = previous.roll;
            return false;
        };
        let t = body.to_local(&up.into_inner());
        let error = Vector3::new(t.z.atan2(t.y), 0.0, (-t.x).atan2(t.y));
        self.command_rotation(&error, omega_local, &Vector3::zeros(), false);
        true
    }

    fn command_rotation(
        &mut self,
        error: &Vector3<f64>,
        omega_local: &Vector3<f64>,
        feed_forward: &Vector3<f64>,
        fast: bool,
    ) {
        let alpha = self.calibrator.estimate();
        let margin = self.config.stopping_margin;
        let gain = if fast {
            f64::INFINITY
        } else {
            self.config.reaction_gain
        };
        let target = Vector3::from_fn(|i, _| {
            error[i].signum() * margin * max_stopping_speed(error[i].abs(), alpha, gain)
        }) + feed_forward;
        let ratio = ((target - omega_local) / alpha.max(f64::EPSILON)).map(|r| r.clamp(-1.0, 1.0));

        self.pending.torque = Vector2::new(ratio.x, ratio.y);
        self.pending.roll = ratio.z;
        if let Some(tick) = self.tick {
            self.calibrator.commanded(tick, ratio, *omega_local);
        }
    }

    /// Emits this tick's command.
    ///
    /// Damping is only sent when it changes; an all-zero command sends one
    /// stop per zero streak and nothing afterwards.
    pub fn apply<C: ActuatorCommands + ?Sized>(&mut self, out: &mut C) -> LatchAction {
        let damping = self.damping();
        if self.damping_applied != Some(damping) {
            out.set_damping(damping);
            self.damping_applied = Some(damping);
        }

        let action = self.latch.update(self.pending.clamped());
        match action {
            LatchAction::Apply(command) => {
                out.apply_force_and_torque(command.force, command.torque, command.roll);
            }
            LatchAction::Stop => {
                debug!(body = %self.id, "Stopping actuators");
                out.stop();
            }
            LatchAction::Hold => {}
        }
        action
    }

    /// Proposes a corrective waypoint while stuck.
    ///
    /// The waypoint lies `recovery_distance` from `reference_point`, away from
    /// the last move obstruction or, failing that, back along the last travel
    /// direction. Returns `None` (and stays stuck) when not stuck, when course
    /// changes are not allowed, or when there is no direction to back away in.
    pub fn recover(&mut self, reference_point: Point3<f64>) -> Option<Point3<f64>> {
        if !self.is_stuck() {
            return None;
        }
        if !self.nav.pathfinder_can_change_course {
            debug!(body = %self.id, "Stuck, but course changes are not allowed");
            return None;
        }
        let away = self
            .move_obstruction
            .and_then(|o| Unit::try_new(reference_point - o.point, DIRECTION_EPSILON))
            .or_else(|| self.travel.map(|t| Unit::new_unchecked(-t.into_inner())))?;

        let waypoint = reference_point + away.into_inner() * self.config.recovery_distance;
        self.distance.reset();
        self.angle.reset();
        self.anchor = None;
        info!(
            body = %self.id,
            x = waypoint.x,
            y = waypoint.y,
            z = waypoint.z,
            "Recovering toward corrective waypoint"
        );
        self.fallback.begin_recovery();
        Some(waypoint)
    }
}

/// Body-local angular error (pitch, yaw, roll) for a rotate request.
///
/// Azimuth and elevation are measured in the reference part's frame, then
/// carried into the body frame. `None` for a zero-length direction.
fn orientation_error(body: &RigidBodyState, request: &RotateRequest) -> Option<Vector3<f64>> {
    let direction = Unit::try_new(request.direction, DIRECTION_EPSILON)?;
    let reference = &request.reference_orientation;
    let local = reference.inverse_transform_vector(&direction.into_inner());

    let azimuth = local.x.atan2(local.z);
    let elevation = local.y.atan2(local.x.hypot(local.z));
    let roll = request
        .up
        .and_then(|up| Unit::try_new(up, DIRECTION_EPSILON))
        .map_or(0.0, |up| {
            let up = reference.inverse_transform_vector(&up.into_inner());
            (-up.x).atan2(up.y)
        });

    let error_reference = Vector3::new(-elevation, azimuth, roll);
    Some(body.to_local(&reference.transform_vector(&error_reference)))
}
