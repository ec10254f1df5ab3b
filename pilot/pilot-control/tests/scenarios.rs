//! End-to-end controller behaviour over synthetic tick sequences.

#![allow(clippy::unwrap_used)]

use std::f64::consts::FRAC_PI_2;
use std::sync::Arc;

use approx::assert_relative_eq;
use nalgebra::{Point3, UnitQuaternion, Vector2, Vector3};
use pilot_control::{
    FallbackState, LatchAction, MotionController, MoveOutcome, MoveRequest, RotateOutcome,
    RotateRequest, TickFrame,
};
use pilot_occupancy::OccupancyRegistry;
use pilot_types::{
    ActuatorCapability, ActuatorCommand, ActuatorCommands, BodyDescriptor, BodyId, CellCoord,
    ControllerConfig, FixedActuators, NavSettings, Neighbour, RigidBodyState,
};

const OWN: BodyId = BodyId(1);
const OTHER: BodyId = BodyId(2);

#[derive(Default)]
struct Recorder {
    applied: Vec<ActuatorCommand>,
    damping: Vec<bool>,
    stops: usize,
}

impl ActuatorCommands for Recorder {
    fn apply_force_and_torque(&mut self, force: Vector3<f64>, torque: Vector2<f64>, roll: f64) {
        self.applied.push(ActuatorCommand { force, torque, roll });
    }

    fn set_damping(&mut self, enabled: bool) {
        self.damping.push(enabled);
    }

    fn stop(&mut self) {
        self.stops += 1;
    }
}

fn registry_with_own(cells: impl IntoIterator<Item = CellCoord>) -> Arc<OccupancyRegistry> {
    let registry = Arc::new(OccupancyRegistry::new());
    registry.register(BodyDescriptor::grid(OWN, 1.0), cells).unwrap();
    registry
}

fn controller(registry: &Arc<OccupancyRegistry>, config: ControllerConfig) -> MotionController {
    MotionController::new(OWN, Arc::clone(registry), config).unwrap()
}

fn thrusters() -> FixedActuators {
    FixedActuators::new(ActuatorCapability::uniform(2000.0, 500.0))
}

fn at(x: f64, y: f64, z: f64) -> RigidBodyState {
    RigidBodyState::new(Point3::new(x, y, z), 1000.0)
}

#[test]
fn arrived_body_at_rest_commands_zero_every_tick() {
    let registry = registry_with_own([CellCoord::origin()]);
    let mut controller = controller(&registry, ControllerConfig::default());
    let actuators = thrusters();
    let body = at(4.0, -2.0, 9.0);
    let request = MoveRequest::new(body.position, body.position);

    for tick in 0..20 {
        let frame = TickFrame::new(tick, body, &actuators);
        assert_eq!(controller.compute_move(&frame, &request), MoveOutcome::Arrived);
        assert!(controller.command().is_zero());
        assert!(!controller.damping());
    }
    assert_eq!(controller.fallback_state(), FallbackState::Normal);
}

#[test]
fn approach_speed_respects_target_and_braking_envelope() {
    let registry = registry_with_own([CellCoord::origin()]);
    let mut controller = controller(&registry, ControllerConfig::default());
    controller
        .set_nav_settings(NavSettings::default().with_speed_target(10.0))
        .unwrap();
    let actuators = thrusters();
    let destination = Point3::new(0.0, 0.0, 100.0);

    for (tick, z) in [0.0, 20.0, 40.0, 55.0, 70.0, 90.0, 98.0].into_iter().enumerate() {
        let body = at(0.0, 0.0, z);
        let frame = TickFrame::new(tick as u64, body, &actuators);
        let outcome = controller.compute_move(&frame, &MoveRequest::new(body.position, destination));
        let MoveOutcome::Moving { target_velocity } = outcome else {
            panic!("expected to move at z = {z}, got {outcome:?}");
        };

        let speed = target_velocity.norm();
        assert!(speed <= 10.0 + 1e-9, "speed {speed} at z = {z}");
        assert_relative_eq!(target_velocity.x, 0.0);
        assert_relative_eq!(target_velocity.y, 0.0);
        assert!(target_velocity.z > 0.0);
        if 100.0 - z < 50.0 {
            assert!(speed < 10.0, "no slowdown at {} m out", 100.0 - z);
        }
        // Forward thrust only.
        let force = controller.command().force;
        assert!(force.z > 0.0 && force.z <= 1.0);
    }
}

#[test]
fn stop_is_sent_once_per_zero_streak() {
    let registry = registry_with_own([CellCoord::origin()]);
    let mut controller = controller(&registry, ControllerConfig::default());
    let actuators = thrusters();
    let body = at(0.0, 0.0, 0.0);
    let stay = MoveRequest::new(body.position, body.position);
    let go = MoveRequest::new(body.position, Point3::new(0.0, 0.0, 30.0));
    let mut out = Recorder::default();

    let mut actions = Vec::new();
    for tick in 0..10 {
        let request = if tick == 5 { go } else { stay };
        controller.compute_move(&TickFrame::new(tick, body, &actuators), &request);
        actions.push(controller.apply(&mut out));
    }

    assert_eq!(out.stops, 2);
    assert_eq!(out.applied.len(), 1);
    assert_eq!(actions[0], LatchAction::Stop);
    assert!(actions[1..5].iter().all(|a| *a == LatchAction::Hold));
    assert!(matches!(actions[5], LatchAction::Apply(_)));
    assert_eq!(actions[6], LatchAction::Stop);
    assert!(actions[7..].iter().all(|a| *a == LatchAction::Hold));
    assert_eq!(out.damping, vec![false]);
}

#[test]
fn stuck_is_declared_on_the_tick_after_the_deadline() {
    let deadline = 10;
    let registry = registry_with_own([CellCoord::origin()]);
    let mut controller = controller(
        &registry,
        ControllerConfig::default().with_stuck_ticks(deadline),
    );
    let actuators = thrusters();
    let body = at(0.0, 0.0, 0.0);
    let request = MoveRequest::new(body.position, Point3::new(0.0, 0.0, 50.0));

    for tick in 0..=u64::from(deadline) {
        controller.compute_move(&TickFrame::new(tick, body, &actuators), &request);
        assert!(!controller.is_stuck(), "stuck early at tick {tick}");
    }
    controller.compute_move(
        &TickFrame::new(u64::from(deadline) + 1, body, &actuators),
        &request,
    );
    assert!(controller.is_stuck());
}

#[test]
fn neighbour_in_the_path_blocks_until_ignored() {
    let registry = registry_with_own([CellCoord::origin()]);
    registry
        .register(BodyDescriptor::grid(OTHER, 1.0), [CellCoord::origin()])
        .unwrap();
    let mut controller = controller(&registry, ControllerConfig::default().with_stuck_ticks(3));
    let actuators = thrusters();
    let body = at(0.0, 0.0, 0.0);
    let neighbours = [Neighbour::new(OTHER, at(0.0, 0.0, 10.0))];
    let request = MoveRequest::new(body.position, Point3::new(0.0, 0.0, 50.0));

    let frame = TickFrame::new(0, body, &actuators).with_neighbours(&neighbours);
    let MoveOutcome::Blocked(obstruction) = controller.compute_move(&frame, &request) else {
        panic!("expected the neighbour to block");
    };
    assert_eq!(obstruction.body, OTHER);
    assert_relative_eq!(obstruction.point, Point3::new(0.0, 0.0, 10.0), epsilon = 1e-12);
    assert!(controller.command().is_zero());
    assert_eq!(controller.move_obstruction(), Some(obstruction));

    // The same neighbour off to the side leaves the sweep clear.
    let aside = [Neighbour::new(OTHER, at(5.0, 0.0, 10.0))];
    let frame = TickFrame::new(1, body, &actuators).with_neighbours(&aside);
    assert!(matches!(
        controller.compute_move(&frame, &request),
        MoveOutcome::Moving { .. }
    ));
    assert_eq!(controller.move_obstruction(), None);

    controller.set_ignored_body(Some(OTHER));
    let frame = TickFrame::new(2, body, &actuators).with_neighbours(&neighbours);
    assert!(matches!(
        controller.compute_move(&frame, &request),
        MoveOutcome::Moving { .. }
    ));
}

#[test]
fn stuck_behind_obstruction_recovers_away_from_it() {
    let registry = registry_with_own([CellCoord::origin()]);
    registry
        .register(BodyDescriptor::grid(OTHER, 1.0), [CellCoord::origin()])
        .unwrap();
    let mut controller = controller(&registry, ControllerConfig::default().with_stuck_ticks(3));
    let actuators = thrusters();
    let body = at(0.0, 0.0, 0.0);
    let neighbours = [Neighbour::new(OTHER, at(0.0, 0.0, 10.0))];
    let request = MoveRequest::new(body.position, Point3::new(0.0, 0.0, 50.0));

    for tick in 0..5 {
        let frame = TickFrame::new(tick, body, &actuators).with_neighbours(&neighbours);
        assert!(matches!(
            controller.compute_move(&frame, &request),
            MoveOutcome::Blocked(_)
        ));
    }
    assert!(controller.is_stuck());

    let waypoint = controller.recover(body.position).unwrap();
    assert_relative_eq!(waypoint, Point3::new(0.0, 0.0, -20.0), epsilon = 1e-12);
    assert_eq!(controller.fallback_state(), FallbackState::Recovering);
    assert!(controller.recover(body.position).is_none());
}

#[test]
fn missing_actuator_data_stops_once() {
    let registry = registry_with_own([CellCoord::origin()]);
    let mut controller = controller(&registry, ControllerConfig::default());
    let dead = FixedActuators {
        capability: None,
        bias: Vector3::zeros(),
    };
    let live = thrusters();
    let body = at(0.0, 0.0, 0.0);
    let request = MoveRequest::new(body.position, Point3::new(0.0, 0.0, 30.0));
    let mut out = Recorder::default();

    controller.compute_move(&TickFrame::new(0, body, &live), &request);
    controller.apply(&mut out);
    for tick in 1..4 {
        assert_eq!(
            controller.compute_move(&TickFrame::new(tick, body, &dead), &request),
            MoveOutcome::NoData
        );
        controller.apply(&mut out);
    }
    assert_eq!(out.applied.len(), 1);
    assert_eq!(out.stops, 1);
}

#[test]
fn overworked_actuators_level_instead_of_turning() {
    let registry = registry_with_own([CellCoord::origin()]);
    let mut controller = controller(&registry, ControllerConfig::default());
    let heavy = FixedActuators::new(ActuatorCapability::uniform(10_000.0, 500.0))
        .with_bias(Vector3::new(0.0, -9.81, 0.0));
    let free = FixedActuators::new(ActuatorCapability::uniform(10_000.0, 500.0));
    let body = at(0.0, 0.0, 0.0);
    let request = RotateRequest::new(UnitQuaternion::identity(), Vector3::x());

    let outcome = controller.compute_rotate(&TickFrame::new(0, body, &heavy), &request);
    assert_eq!(outcome, RotateOutcome::Leveling);
    assert!(controller.is_overworked());
    // Already level: no pitch or roll, and the requested yaw is not attempted.
    assert!(controller.command().is_rotation_zero());

    let outcome = controller.compute_rotate(&TickFrame::new(1, body, &free), &request);
    assert!(matches!(outcome, RotateOutcome::Rotating { .. }));
    assert!(!controller.is_overworked());
    assert!(controller.command().torque.y > 0.0);
}

#[test]
fn rotation_that_swings_into_a_neighbour_is_vetoed() {
    // A boom along +Z; yawing toward +X sweeps it through the neighbour.
    let registry = registry_with_own(CellCoord::span(
        CellCoord::origin(),
        CellCoord::new(0, 0, 4),
    ));
    registry
        .register(BodyDescriptor::grid(OTHER, 1.0), [CellCoord::origin()])
        .unwrap();
    let mut controller = controller(&registry, ControllerConfig::default());
    let actuators = thrusters();
    let body = at(0.0, 0.0, 0.0);
    let neighbours = [Neighbour::new(OTHER, at(4.0, 0.0, 0.0))];
    let frame = TickFrame::new(0, body, &actuators).with_neighbours(&neighbours);

    let toward = RotateRequest::new(UnitQuaternion::identity(), Vector3::x());
    let RotateOutcome::Blocked { obstruction, leveling } = controller.compute_rotate(&frame, &toward)
    else {
        panic!("expected the neighbour to block the turn");
    };
    assert_eq!(obstruction.body, OTHER);
    assert!(!leveling);
    assert!(controller.command().is_rotation_zero());
    assert_eq!(controller.rotate_obstruction(), Some(obstruction));

    // Turning the other way sweeps clear of it.
    let frame = TickFrame::new(1, body, &actuators).with_neighbours(&neighbours);
    let away = RotateRequest::new(UnitQuaternion::identity(), -Vector3::x());
    let outcome = controller.compute_rotate(&frame, &away);
    let RotateOutcome::Rotating { error } = outcome else {
        panic!("expected to rotate, got {outcome:?}");
    };
    assert_relative_eq!(error.y, -FRAC_PI_2, epsilon = 1e-12);
    assert!(controller.command().torque.y < 0.0);
    assert_eq!(controller.rotate_obstruction(), None);
}

#[test]
fn move_and_rotate_in_one_tick_emit_one_combined_command() {
    let registry = registry_with_own([CellCoord::origin()]);
    let mut controller = controller(&registry, ControllerConfig::default());
    let actuators = thrusters();
    let destination = Point3::new(0.0, 0.0, 50.0);
    let face = RotateRequest::new(UnitQuaternion::identity(), Vector3::x());
    let mut out = Recorder::default();
    let prior = 500.0 / 1000.0;

    let body = at(0.0, 0.0, 0.0);
    let frame = TickFrame::new(0, body, &actuators);
    assert!(matches!(
        controller.compute_move(&frame, &MoveRequest::new(body.position, destination)),
        MoveOutcome::Moving { .. }
    ));
    assert!(matches!(
        controller.compute_rotate(&frame, &face),
        RotateOutcome::Rotating { .. }
    ));
    let command = controller.command();
    assert!(command.force.z > 0.0);
    assert!(command.torque.y > 0.0);
    assert!(matches!(controller.apply(&mut out), LatchAction::Apply(_)));
    assert_eq!(out.applied, vec![command]);
    assert_relative_eq!(controller.torque_estimate(), prior);

    // Next tick the yaw rate has picked up: the commanded torque is paired
    // with the response and the estimate moves off its prior.
    let body = at(0.0, 0.0, 0.0).with_angular_velocity(Vector3::new(0.0, 0.05, 0.0));
    let frame = TickFrame::new(1, body, &actuators);
    controller.compute_move(&frame, &MoveRequest::new(body.position, destination));
    controller.compute_rotate(&frame, &face);
    assert!(controller.torque_estimate() > prior);
    assert!(controller.command().force.z > 0.0);
    assert_eq!(controller.fallback_state(), FallbackState::Normal);
}

#[test]
fn turning_in_place_does_not_cancel_a_stuck_move() {
    let registry = registry_with_own([CellCoord::origin()]);
    let mut controller = controller(&registry, ControllerConfig::default().with_stuck_ticks(2));
    let actuators = thrusters();
    let destination = Point3::new(0.0, 0.0, 50.0);

    let mut waypoint = None;
    for tick in 0..6_u32 {
        // Pinned in place, but the yaw toward +X keeps improving.
        let yaw = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.1 * f64::from(tick));
        let body = at(0.0, 0.0, 0.0).with_orientation(yaw);
        let frame = TickFrame::new(u64::from(tick), body, &actuators);
        controller.compute_move(&frame, &MoveRequest::new(body.position, destination));
        let stuck_after_move = controller.is_stuck();
        let face = RotateRequest::new(yaw, Vector3::x());
        assert!(matches!(
            controller.compute_rotate(&frame, &face),
            RotateOutcome::Rotating { .. }
        ));
        assert_eq!(controller.is_stuck(), stuck_after_move);

        if let Some(point) = controller.recover(body.position) {
            waypoint = Some((tick, point));
            break;
        }
    }

    let (tick, point) = waypoint.unwrap();
    assert_eq!(tick, 3);
    assert_relative_eq!(point, Point3::new(0.0, 0.0, -20.0), epsilon = 1e-12);
    assert_eq!(controller.fallback_state(), FallbackState::Recovering);
}
