//! # Render Error Types
//!
//! Surface failures are terminal for the surface and nothing else. Each
//! variant carries a stable numeric code so a host can report it without
//! matching on Rust types.

use simview_core::Resolution;
use thiserror::Error;

/// Failure reported by a graphics backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The graphics subsystem could not be brought up.
    #[error("graphics init failed: {0}")]
    Init(String),

    /// A window or its context could not be created.
    #[error("window creation failed: {0}")]
    WindowCreation(String),

    /// The backend cannot render to offscreen targets.
    #[error("offscreen rendering not supported")]
    OffscreenUnsupported,

    /// A live context stopped working.
    #[error("context lost: {0}")]
    ContextLost(String),

    /// A pixel read asked for a region the context does not hold.
    #[error("viewport {requested:?} does not match rendered {rendered:?}")]
    ViewportMismatch {
        /// Region requested by the caller.
        requested: Resolution,
        /// Region last rendered.
        rendered: Resolution,
    },
}

/// Failure of one render surface.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    /// Surface has no valid target (no bound instance, or unknown camera).
    #[error("unknown render target")]
    UnknownTarget,

    /// The context or window could not be created.
    #[error("context creation failed: {0}")]
    ContextCreation(BackendError),

    /// Offscreen targets are not available.
    #[error("offscreen target not supported")]
    OffscreenUnsupported,

    /// RGB-D buffers could not be allocated.
    #[error("failed to allocate {bytes} bytes of RGB-D buffer")]
    BufferAlloc {
        /// Requested size.
        bytes: usize,
    },

    /// The graphics subsystem itself failed to start.
    #[error("graphics backend init failed: {0}")]
    BackendInit(BackendError),

    /// The surface exited earlier and does nothing any more.
    #[error("surface already exited")]
    AlreadyExited,

    /// `render_once` was called before `initialize`.
    #[error("surface not initialized")]
    NotInitialized,

    /// Drawing or reading pixels failed after init.
    #[error("render failed: {0}")]
    RenderFailed(BackendError),
}

impl SurfaceError {
    /// Code reported for a surface that initialized cleanly.
    pub const NO_ERROR: i32 = 0;

    /// Stable numeric code for this error.
    #[must_use]
    pub const fn code(&self) -> i32 {
        match self {
            Self::UnknownTarget => 1,
            Self::ContextCreation(_) => 2,
            Self::OffscreenUnsupported => 3,
            Self::BufferAlloc { .. } => 4,
            Self::BackendInit(_) => 5,
            Self::AlreadyExited => 6,
            Self::NotInitialized => 7,
            Self::RenderFailed(_) => 8,
        }
    }
}

/// Result type for surface operations.
pub type SurfaceResult<T> = Result<T, SurfaceError>;

/// Result type for backend calls.
pub type BackendResult<T> = Result<T, BackendError>;
