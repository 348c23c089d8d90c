//! Reference oracle: point masses under gravity with a flat ground.

use super::{PhysicsOracle, SimulationState};
use crate::model::{SensorKind, SimulationModel};

/// Semi-implicit Euler over point bodies.
///
/// Actuators push their body along their axis with `gear * ctrl` newtons.
/// Bodies never sink below the ground plane; hitting it kills the downward
/// velocity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BallisticOracle {
    /// Height of the ground plane, `None` for free fall.
    pub ground: Option<f64>,
}

impl BallisticOracle {
    /// Oracle with a ground plane at `z = 0`.
    #[must_use]
    pub const fn new() -> Self {
        Self { ground: Some(0.0) }
    }

    /// Oracle without a ground plane.
    #[must_use]
    pub const fn free_fall() -> Self {
        Self { ground: None }
    }

    fn write_sensors(model: &SimulationModel, state: &mut SimulationState) {
        for (index, sensor) in model.sensors().iter().enumerate() {
            let Some(addr) = model.sensor_addr(index) else {
                continue;
            };
            match sensor.kind {
                SensorKind::BodyPosition(body) => {
                    state.sensordata[addr..addr + 3].copy_from_slice(&state.positions[body]);
                }
                SensorKind::BodyVelocity(body) => {
                    state.sensordata[addr..addr + 3].copy_from_slice(&state.velocities[body]);
                }
                SensorKind::ActuatorForce(actuator) => {
                    state.sensordata[addr] = state.actuator_force[actuator];
                }
                SensorKind::Clock => state.sensordata[addr] = state.time,
            }
        }
    }
}

impl Default for BallisticOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsOracle for BallisticOracle {
    fn step(&mut self, model: &SimulationModel, state: &mut SimulationState) {
        let dt = model.timestep();
        let gravity = model.gravity();

        let mut forces = vec![[0.0f64; 3]; model.bodies().len()];
        for (index, actuator) in model.actuators().iter().enumerate() {
            let mut ctrl = state.ctrl[index];
            if let Some((lo, hi)) = actuator.ctrl_range {
                ctrl = ctrl.clamp(lo, hi);
            }
            let force = actuator.gear * ctrl;
            state.actuator_force[index] = force;
            for axis in 0..3 {
                forces[actuator.body][axis] += force * actuator.axis[axis];
            }
        }

        for (body, spec) in model.bodies().iter().enumerate() {
            let velocity = &mut state.velocities[body];
            let position = &mut state.positions[body];
            for axis in 0..3 {
                velocity[axis] += (gravity[axis] + forces[body][axis] / spec.mass) * dt;
                position[axis] += velocity[axis] * dt;
            }
            if let Some(ground) = self.ground {
                if position[2] < ground {
                    position[2] = ground;
                    velocity[2] = velocity[2].max(0.0);
                }
            }
        }

        state.time += dt;
        state.steps += 1;
        Self::write_sensors(model, state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ActuatorSpec;

    fn drop_model() -> SimulationModel {
        SimulationModel::builder("drop")
            .timestep(0.01)
            .body("ball", [0.0, 0.0, 1.0], 0.05, [1.0; 4])
            .actuator("lift", 0, [0.0, 0.0, 1.0], 1.0)
            .sensor("pos", SensorKind::BodyPosition(0))
            .sensor("lift_force", SensorKind::ActuatorForce(0))
            .sensor("clock", SensorKind::Clock)
            .build()
            .unwrap()
    }

    #[test]
    fn test_falls_and_stops_at_ground() {
        let model = drop_model();
        let mut state = SimulationState::new(&model);
        let mut oracle = BallisticOracle::new();

        oracle.step(&model, &mut state);
        assert!(state.positions[0][2] < 1.0);

        for _ in 0..500 {
            oracle.step(&model, &mut state);
        }
        assert_eq!(state.positions[0][2], 0.0);
        assert!(state.velocities[0][2] >= 0.0);
    }

    #[test]
    fn test_actuator_cancels_gravity() {
        let model = drop_model();
        let mut state = SimulationState::new(&model);
        state.ctrl[0] = 9.81;
        let mut oracle = BallisticOracle::free_fall();
        for _ in 0..100 {
            oracle.step(&model, &mut state);
        }
        assert!((state.positions[0][2] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_sensors_follow_state() {
        let model = drop_model();
        let mut state = SimulationState::new(&model);
        state.ctrl[0] = 2.0;
        let mut oracle = BallisticOracle::new();
        oracle.step(&model, &mut state);

        assert_eq!(&state.sensordata[0..3], &state.positions[0]);
        assert_eq!(state.sensordata[3], 2.0);
        assert!((state.sensordata[4] - 0.01).abs() < 1e-12);
        assert_eq!(state.steps, 1);
    }

    fn clamped_model(range: (f64, f64)) -> SimulationModel {
        SimulationModel::builder("clamped")
            .timestep(0.01)
            .body("ball", [0.0, 0.0, 1.0], 0.05, [1.0; 4])
            .actuator_spec(ActuatorSpec {
                name: "lift".into(),
                body: 0,
                axis: [0.0, 0.0, 1.0],
                gear: 2.0,
                ctrl_range: Some(range),
            })
            .build()
            .unwrap()
    }

    #[test]
    fn test_control_clamped_to_range() {
        let model = clamped_model((-1.0, 1.0));
        let mut state = SimulationState::new(&model);
        let mut oracle = BallisticOracle::free_fall();

        state.ctrl[0] = 5.0;
        oracle.step(&model, &mut state);
        assert_eq!(state.actuator_force[0], 2.0);

        state.ctrl[0] = -5.0;
        oracle.step(&model, &mut state);
        assert_eq!(state.actuator_force[0], -2.0);

        state.ctrl[0] = 0.25;
        oracle.step(&model, &mut state);
        assert_eq!(state.actuator_force[0], 0.5);
    }

    #[test]
    fn test_control_at_range_bounds() {
        let model = clamped_model((-1.0, 1.0));
        let mut state = SimulationState::new(&model);
        let mut oracle = BallisticOracle::free_fall();
        for (ctrl, force) in [(1.0, 2.0), (-1.0, -2.0)] {
            state.ctrl[0] = ctrl;
            oracle.step(&model, &mut state);
            assert_eq!(state.actuator_force[0], force);
        }

        let pinned = clamped_model((0.5, 0.5));
        let mut state = SimulationState::new(&pinned);
        state.ctrl[0] = -3.0;
        oracle.step(&pinned, &mut state);
        assert_eq!(state.actuator_force[0], 1.0);
    }
}
