//! # Graphics Backend Seam
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ GraphicsLayer                                │
//! │   ReentrantMutex ── every entry point        │
//! │   Box<dyn GraphicsBackend>                   │
//! │       init / create_context / poll / term    │
//! └──────────────────┬───────────────────────────┘
//!                    │ create_context
//!                    ▼
//!          Box<dyn GraphicsContext>   (one per surface)
//!          render / swap / read_pixels / destroy
//! ```
//!
//! The graphics layer is neither thread-safe nor reentrant. The lock is
//! recursive because surface init runs both from the coordinator and from
//! interface discovery on a client thread, and an init may call back into
//! the layer while already holding it.

mod software;

pub use software::{SoftwareBackend, SoftwareConfig, SoftwareStats};

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use simview_core::Resolution;

use crate::error::BackendResult;
use crate::input::WindowEvent;
use crate::scene::{CameraPose, Scene, SceneAssets};

/// Identifier of a graphics context. Window events carry the id of the
/// window they belong to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContextId(pub u64);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "context#{}", self.0)
    }
}

/// What a context draws into.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SurfaceTarget {
    /// An on-screen window.
    Window {
        /// Title bar text.
        title: String,
        /// Requested window size.
        size: Resolution,
        /// Sync swaps to the display.
        vsync: bool,
    },
    /// A headless framebuffer.
    Offscreen {
        /// Requested framebuffer size.
        size: Resolution,
    },
}

/// Process-wide graphics subsystem.
pub trait GraphicsBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Brings the subsystem up. Called once, before any context.
    fn init(&self) -> BackendResult<()>;

    /// Creates a context for one surface.
    fn create_context(&self, target: &SurfaceTarget) -> BackendResult<Box<dyn GraphicsContext>>;

    /// Drains pending input events for every window.
    fn poll_events(&self) -> Vec<WindowEvent>;

    /// Tears the subsystem down. Called once, after every context is gone.
    fn terminate(&self);
}

/// One surface's context.
pub trait GraphicsContext: Send {
    /// Context id.
    fn id(&self) -> ContextId;

    /// Largest viewport this context can render. For offscreen contexts
    /// this is the granted framebuffer size.
    fn max_viewport(&self) -> Resolution;

    /// Current drawable size of a window.
    fn framebuffer_size(&self) -> Resolution;

    /// Uploads static assets. Called once after creation.
    fn upload_assets(&mut self, assets: &SceneAssets);

    /// Draws `scene` from `pose` into `viewport`.
    fn render(&mut self, scene: &Scene, pose: &CameraPose, viewport: Resolution) -> BackendResult<()>;

    /// Presents the back buffer of a window.
    fn swap_buffers(&mut self);

    /// Returns `true` once the user asked the window to close.
    fn should_close(&self) -> bool;

    /// Copies the last rendered `viewport` into `rgb` and `depth`.
    fn read_pixels(&mut self, viewport: Resolution, rgb: &mut [u8], depth: &mut [f32]) -> BackendResult<()>;

    /// Frees every resource of this context.
    fn destroy(self: Box<Self>);
}

/// The backend plus the recursive lock guarding it.
///
/// Init and terminate are paired per run: after [`terminate`](Self::terminate)
/// the next [`ensure_init`](Self::ensure_init) brings the backend up again.
pub struct GraphicsLayer {
    backend: Box<dyn GraphicsBackend>,
    lock: ReentrantMutex<()>,
    initialized: AtomicBool,
}

impl GraphicsLayer {
    /// Wraps a backend.
    #[must_use]
    pub fn new(backend: Box<dyn GraphicsBackend>) -> Self {
        Self {
            backend,
            lock: ReentrantMutex::new(()),
            initialized: AtomicBool::new(false),
        }
    }

    /// Takes the graphics lock. Re-entering from the holding thread is fine.
    pub fn enter(&self) -> ReentrantMutexGuard<'_, ()> {
        self.lock.lock()
    }

    /// The wrapped backend. Callers hold [`enter`](Self::enter).
    #[must_use]
    pub fn backend(&self) -> &dyn GraphicsBackend {
        self.backend.as_ref()
    }

    /// Initializes the backend unless it is already up.
    pub fn ensure_init(&self) -> BackendResult<()> {
        let _guard = self.enter();
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }
        self.backend.init()?;
        self.initialized.store(true, Ordering::Release);
        tracing::info!("graphics backend '{}' initialized", self.backend.name());
        Ok(())
    }

    /// Terminates the backend if it is up. Otherwise does nothing.
    pub fn terminate(&self) {
        let _guard = self.enter();
        if !self.initialized.swap(false, Ordering::AcqRel) {
            return;
        }
        self.backend.terminate();
        tracing::info!("graphics backend '{}' terminated", self.backend.name());
    }

    /// Returns `true` between a successful init and the next terminate.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }
}

impl fmt::Debug for GraphicsLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphicsLayer")
            .field("backend", &self.backend.name())
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_is_reentrant() {
        let layer = GraphicsLayer::new(Box::new(SoftwareBackend::new()));
        let _outer = layer.enter();
        let _inner = layer.enter();
        assert!(layer.ensure_init().is_ok());
    }

    #[test]
    fn test_init_once_terminate_once() {
        let backend = SoftwareBackend::new();
        let layer = GraphicsLayer::new(Box::new(backend.clone()));
        layer.ensure_init().unwrap();
        layer.ensure_init().unwrap();
        layer.terminate();
        layer.terminate();
        let stats = backend.stats();
        assert_eq!(stats.inits, 1);
        assert_eq!(stats.terminations, 1);
        assert!(!layer.is_initialized());
    }

    #[test]
    fn test_terminate_without_init_is_noop() {
        let backend = SoftwareBackend::new();
        let layer = GraphicsLayer::new(Box::new(backend.clone()));
        layer.terminate();
        assert_eq!(backend.stats().terminations, 0);
    }

    #[test]
    fn test_failed_init_can_be_retried() {
        let backend = SoftwareBackend::with_config(SoftwareConfig {
            fail_init: true,
            ..SoftwareConfig::default()
        });
        let layer = GraphicsLayer::new(Box::new(backend.clone()));
        assert!(layer.ensure_init().is_err());
        assert!(layer.ensure_init().is_err());
        assert!(!layer.is_initialized());
        assert_eq!(backend.stats().inits, 2);
    }
}
