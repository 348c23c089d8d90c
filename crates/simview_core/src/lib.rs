//! # Simview Core
//!
//! Graphics-free building blocks shared by the render layer and the
//! simulation runtime:
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌──────────────────────┐
//! │ model        │   │ physics          │   │ sync                 │
//! │ topology,    │──►│ SimulationState, │   │ HandoffSemaphore,    │
//! │ interfaces   │   │ PhysicsOracle    │   │ CameraSchedule       │
//! └──────────────┘   └──────────────────┘   └──────────────────────┘
//!         ▲
//!         │ config: RenderMode, ClientSettings, ContextConfig
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use simview_core::{SimulationModel, SensorKind};
//!
//! let model = SimulationModel::builder("cart")
//!     .body("cart", [0.0, 0.0, 0.1], 0.1, [0.8, 0.2, 0.2, 1.0])
//!     .actuator("push", 0, [1.0, 0.0, 0.0], 5.0)
//!     .sensor("cart_pos", SensorKind::BodyPosition(0))
//!     .build()?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod error;
pub mod ids;
pub mod model;
pub mod physics;
pub mod sync;

pub use config::{ClientSettings, ContextConfig, RenderMode, SimviewConfig};
pub use error::{ConfigError, ConfigResult, ModelError, ModelResult};
pub use ids::{InstanceId, SurfaceId};
pub use model::{
    linearize_depth, CameraDef, CameraInterface, CameraSpec, ControlInterface, GeomSpec,
    InterfaceLayout, ModelStats, Resolution, SensorInterface, SensorKind, SimulationModel,
    VisualSettings,
};
pub use physics::{BallisticOracle, PhysicsOracle, SimulationState};
pub use sync::{CameraSchedule, HandoffSemaphore};
