//! # Core Error Types
//!
//! Errors raised while building a model or loading configuration.

use thiserror::Error;

/// Errors that can occur while assembling a [`SimulationModel`](crate::SimulationModel).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// The physics timestep must be strictly positive and finite.
    #[error("invalid timestep: {0}")]
    InvalidTimestep(f64),

    /// A geom, actuator, camera or sensor references a body that does not exist.
    #[error("{owner} '{name}' references body {body}, model has {body_count} bodies")]
    UnknownBody {
        /// Kind of element holding the reference.
        owner: &'static str,
        /// Name of the element holding the reference.
        name: String,
        /// The referenced body index.
        body: usize,
        /// Number of bodies in the model.
        body_count: usize,
    },

    /// A sensor references an actuator that does not exist.
    #[error("sensor '{name}' references actuator {actuator}, model has {actuator_count} actuators")]
    UnknownActuator {
        /// Sensor name.
        name: String,
        /// The referenced actuator index.
        actuator: usize,
        /// Number of actuators in the model.
        actuator_count: usize,
    },

    /// Every named element must carry a non-empty name.
    #[error("empty {0} name")]
    EmptyName(&'static str),

    /// Two elements of the same kind share a name.
    #[error("duplicate {kind} name '{name}'")]
    DuplicateName {
        /// Kind of element.
        kind: &'static str,
        /// The duplicated name.
        name: String,
    },

    /// A numeric model parameter is out of range.
    #[error("invalid {field}: {value}")]
    InvalidValue {
        /// Field name.
        field: &'static str,
        /// Offending value.
        value: f64,
    },
}

/// Result type for model construction.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse TOML content.
    #[error("failed to parse config TOML: {source}")]
    Toml {
        /// The underlying TOML parse error.
        #[from]
        source: toml::de::Error,
    },

    /// A value parsed but is out of range.
    #[error("invalid configuration: {field} = {value}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// The offending value, rendered for the message.
        value: String,
    },
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;
