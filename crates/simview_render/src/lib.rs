//! # Simview Render
//!
//! Surfaces and the graphics seam they draw through.
//!
//! ```text
//!        SourceResolver (registry)
//!               │ resolve(InstanceId)
//!               ▼
//! ┌──────────────────────────┐      ┌───────────────────────────┐
//! │ RenderSurface            │      │ GraphicsLayer             │
//! │  bindings: [primary, ..] │─────►│  recursive lock           │
//! │  scene, camera, pointer  │      │  dyn GraphicsBackend      │
//! │  FrameBuffer (own mutex) │      │   └─ dyn GraphicsContext  │
//! └──────────────────────────┘      └───────────────────────────┘
//! ```
//!
//! ## Rules
//!
//! 1. **Every graphics call holds the graphics lock.** The layer is not
//!    thread-safe and not reentrant; the lock makes it both.
//! 2. **Failure stays in the surface.** A surface that cannot init or draw
//!    exits and reports a code. It never panics.
//! 3. **Pixels have their own lock.** Copying a camera image out never waits
//!    for physics, and physics never waits for a copy.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod backend;
pub mod error;
pub mod frame;
pub mod input;
pub mod scene;
pub mod surface;

pub use backend::{
    ContextId, GraphicsBackend, GraphicsContext, GraphicsLayer, SoftwareBackend, SoftwareConfig,
    SoftwareStats, SurfaceTarget,
};
pub use error::{BackendError, BackendResult, SurfaceError, SurfaceResult};
pub use frame::FrameBuffer;
pub use input::{InputEvent, MouseButton, PointerState, WindowEvent};
pub use scene::{
    CameraPose, GeomCategories, GeomCategory, MouseAction, Scene, SceneAssets, SceneGeom,
    SceneSource, SceneSummary, SourceResolver, ViewCamera,
};
pub use surface::{
    measure_offscreen_viewport, RenderOutcome, RenderSurface, SurfaceKind, SurfaceState, WindowSpec,
};
