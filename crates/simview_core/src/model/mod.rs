//! # Simulation Model
//!
//! Immutable topology shared by every instance of a simulation, plus the
//! flat interface descriptors derived from it.

mod interface;
mod spec;

pub use interface::{CameraInterface, ControlInterface, InterfaceLayout, SensorInterface};
pub use spec::{
    linearize_depth, ActuatorSpec, BodySpec, CameraDef, GeomSpec, ModelBuilder, ModelStats,
    Resolution, SensorKind, SensorSpec, SimulationModel, VisualSettings,
};

/// Identity of one model camera, fixed after discovery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraSpec {
    /// Index into [`SimulationModel::cameras`].
    pub id: usize,
    /// Camera name.
    pub name: String,
    /// Granted resolution.
    pub resolution: Resolution,
}

impl SimulationModel {
    /// Sample time a host scheduler should tick this model at.
    #[must_use]
    pub const fn sample_time(&self) -> f64 {
        self.timestep()
    }
}
