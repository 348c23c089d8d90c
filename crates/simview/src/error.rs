//! # Runtime Error Types

use simview_core::{ConfigError, ModelError};
use simview_render::SurfaceError;
use thiserror::Error;

/// Errors returned by simulation clients and the render context.
#[derive(Debug, Error)]
pub enum SimError {
    /// Control vector does not match the model's actuator count.
    #[error("control vector has {actual} entries, model expects {expected}")]
    ControlLength {
        /// Actuator count.
        expected: usize,
        /// Entries supplied.
        actual: usize,
    },

    /// Sensor index out of range.
    #[error("sensor index {index} out of range, model has {count} sensors")]
    SensorIndex {
        /// Requested index.
        index: usize,
        /// Number of sensors.
        count: usize,
    },

    /// A caller-owned output buffer is smaller than the discovered layout.
    #[error("{what} buffer holds {actual} elements, layout needs {needed}")]
    BufferTooSmall {
        /// Which output.
        what: &'static str,
        /// Required length.
        needed: usize,
        /// Supplied length.
        actual: usize,
    },

    /// The physics oracle left a sensor vector of the wrong length.
    #[error("oracle left {actual} sensor scalars, model declares {expected}")]
    SensorDataLength {
        /// Scalars the model declares.
        expected: usize,
        /// Scalars present in the state.
        actual: usize,
    },

    /// A camera frame was requested while no coordinator was accepting
    /// requests.
    #[error("render coordinator is not running")]
    CoordinatorUnavailable,

    /// Registration was attempted after the first simulation tick.
    #[error("registry is sealed, clients must register before the first tick")]
    RegistrySealed,

    /// The client was already terminated.
    #[error("client already terminated")]
    Terminated,

    /// The coordinator thread could not be started.
    #[error("failed to spawn render coordinator: {0}")]
    ThreadSpawn(#[source] std::io::Error),

    /// A render surface failed.
    #[error(transparent)]
    Surface(#[from] SurfaceError),

    /// The model is invalid.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for runtime operations.
pub type SimResult<T> = Result<T, SimError>;
