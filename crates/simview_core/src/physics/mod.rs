//! # Physics Seam
//!
//! The integrator is an external collaborator. This module fixes the state
//! it works on and the one call the runtime makes into it.
//!
//! ```text
//! SimulationInstance ── state mutex ──► SimulationState
//!                                            │
//!                         PhysicsOracle::step(model, &mut state)
//! ```

mod ballistic;

pub use ballistic::BallisticOracle;

use crate::model::SimulationModel;

// ============================================================================
// STATE
// ============================================================================

/// Mutable physics state of one simulation instance.
///
/// Owned by the instance and only touched under its state mutex.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationState {
    /// Simulation time in seconds.
    pub time: f64,
    /// Number of completed steps.
    pub steps: u64,
    /// Body positions.
    pub positions: Vec<[f64; 3]>,
    /// Body velocities.
    pub velocities: Vec<[f64; 3]>,
    /// Current control vector, one entry per actuator.
    pub ctrl: Vec<f64>,
    /// Force produced by each actuator on the last step.
    pub actuator_force: Vec<f64>,
    /// Flat sensor output, laid out by the model's sensor addresses.
    pub sensordata: Vec<f64>,
}

impl SimulationState {
    /// Creates the time-zero state for `model`.
    #[must_use]
    pub fn new(model: &SimulationModel) -> Self {
        Self {
            time: 0.0,
            steps: 0,
            positions: model.bodies().iter().map(|b| b.initial_position).collect(),
            velocities: model.bodies().iter().map(|b| b.initial_velocity).collect(),
            ctrl: vec![0.0; model.actuators().len()],
            actuator_force: vec![0.0; model.actuators().len()],
            sensordata: vec![0.0; model.sensor_scalars()],
        }
    }

    /// World position of the center of geom `index` at the current state.
    #[must_use]
    pub fn geom_position(&self, model: &SimulationModel, index: usize) -> Option<[f64; 3]> {
        let geom = model.geoms().get(index)?;
        let origin = match geom.body {
            Some(body) => *self.positions.get(body)?,
            None => [0.0; 3],
        };
        Some([
            origin[0] + geom.offset[0],
            origin[1] + geom.offset[1],
            origin[2] + geom.offset[2],
        ])
    }
}

// ============================================================================
// ORACLE
// ============================================================================

/// Advances a simulation by one fixed timestep.
///
/// Implementations must advance `state.time` by exactly `model.timestep()`,
/// apply `state.ctrl` and refresh `state.sensordata`.
pub trait PhysicsOracle: Send {
    /// Performs one step.
    fn step(&mut self, model: &SimulationModel, state: &mut SimulationState);
}

impl<F> PhysicsOracle for F
where
    F: FnMut(&SimulationModel, &mut SimulationState) + Send,
{
    fn step(&mut self, model: &SimulationModel, state: &mut SimulationState) {
        self(model, state);
    }
}
