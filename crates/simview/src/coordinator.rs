//! # Render Coordinator
//!
//! The only thread that touches the graphics layer.
//!
//! ```text
//! spawn ──► init phase ─────────────────────────► steady loop ──► exit
//!           1. offscreen surfaces (per instance)    windows by fps     release all
//!              publish granted camera layouts       input dispatch     terminate gfx
//!           2. window surfaces + event routing      camera requests
//!           3. accepting = true, signal ready       park when idle
//! ```
//!
//! ## Exit
//!
//! Whatever ends the loop (shutdown flag or a panic inside a surface), the
//! exit guard stops accepting requests, releases any requester still
//! waiting, releases every surface once and terminates the graphics layer
//! once. All of it on this thread.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{JoinHandle, Thread};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use simview_core::{CameraInterface, InstanceId, Resolution, SurfaceId};
use simview_render::{GraphicsLayer, RenderOutcome, RenderSurface, SurfaceError, WindowEvent};

use crate::error::{SimError, SimResult};
use crate::registry::RegistrySnapshot;

/// A surface that failed to initialize inside the coordinator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderInitError {
    /// Failing surface.
    pub surface: SurfaceId,
    /// Owning instance, for camera surfaces.
    pub instance: Option<InstanceId>,
    /// The failure.
    pub error: SurfaceError,
}

impl RenderInitError {
    /// Numeric code of the failure.
    #[must_use]
    pub const fn code(&self) -> i32 {
        self.error.code()
    }
}

/// Flags shared between the coordinator and everyone who talks to it.
#[derive(Debug, Default)]
pub struct CoordinatorStatus {
    shutdown: AtomicBool,
    accepting: AtomicBool,
    thread: Mutex<Option<Thread>>,
    init_errors: Mutex<Vec<RenderInitError>>,
    released: AtomicUsize,
}

impl CoordinatorStatus {
    /// Returns `true` while camera requests will be served.
    #[must_use]
    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    pub(crate) fn set_accepting(&self, accepting: bool) {
        self.accepting.store(accepting, Ordering::SeqCst);
    }

    /// Returns `true` once shutdown was requested.
    #[must_use]
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Asks the coordinator to exit after its current iteration.
    pub(crate) fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.wake();
    }

    /// Unparks the coordinator if it is idle.
    pub(crate) fn wake(&self) {
        if let Some(thread) = self.thread.lock().as_ref() {
            thread.unpark();
        }
    }

    /// Surfaces released by the last coordinator run.
    #[must_use]
    pub fn surfaces_released(&self) -> usize {
        self.released.load(Ordering::Acquire)
    }

    pub(crate) fn take_init_errors(&self) -> Vec<RenderInitError> {
        std::mem::take(&mut *self.init_errors.lock())
    }

    fn record(&self, surface: &RenderSurface, instance: Option<InstanceId>, error: SurfaceError) {
        self.init_errors.lock().push(RenderInitError {
            surface: surface.id(),
            instance,
            error,
        });
    }

    /// Clears every flag for a fresh run.
    pub(crate) fn reset(&self) {
        self.shutdown.store(false, Ordering::Release);
        self.accepting.store(false, Ordering::SeqCst);
        *self.thread.lock() = None;
        self.init_errors.lock().clear();
        self.released.store(0, Ordering::Release);
    }
}

/// Starts the coordinator and blocks until its init phase is done.
pub(crate) fn spawn(
    gfx: Arc<GraphicsLayer>,
    registry: Arc<RegistrySnapshot>,
    status: Arc<CoordinatorStatus>,
    idle: Duration,
) -> SimResult<JoinHandle<()>> {
    let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
    let thread_status = Arc::clone(&status);

    let handle = std::thread::Builder::new()
        .name("render-coordinator".into())
        .spawn(move || {
            let coordinator = Coordinator {
                gfx,
                registry,
                status: thread_status,
                idle,
            };
            coordinator.run(&ready_tx);
        })
        .map_err(SimError::ThreadSpawn)?;

    *status.thread.lock() = Some(handle.thread().clone());
    // Err means the thread died before signalling; its exit guard already
    // cleaned up and requests will fail fast.
    let _ = ready_rx.recv();
    Ok(handle)
}

struct Coordinator {
    gfx: Arc<GraphicsLayer>,
    registry: Arc<RegistrySnapshot>,
    status: Arc<CoordinatorStatus>,
    idle: Duration,
}

impl Coordinator {
    fn run(&self, ready: &Sender<()>) {
        let _exit = ExitGuard {
            gfx: Arc::clone(&self.gfx),
            registry: Arc::clone(&self.registry),
            status: Arc::clone(&self.status),
        };

        let events = self.init_phase();
        self.status.set_accepting(true);
        let _ = ready.send(());
        tracing::info!(
            "render coordinator running: {} instances, {} windows",
            self.registry.instances().len(),
            self.registry.windows().len()
        );

        while !self.status.shutdown_requested() {
            let busy = self.iterate(&events);
            if !busy {
                std::thread::park_timeout(self.idle);
            }
        }
        tracing::info!("render coordinator stopping");
    }

    /// Offscreen surfaces first so camera sizes are published before any
    /// instance may request a frame, then windows.
    fn init_phase(&self) -> Receiver<WindowEvent> {
        let resolver = self.registry.as_ref();

        for instance in self.registry.instances() {
            let mut names = Vec::new();
            let mut sizes = Vec::new();
            for surface in instance.camera_surfaces() {
                let Some(camera) = surface.camera() else {
                    continue;
                };
                let size = match surface.initialize(&self.gfx, resolver) {
                    Ok(size) => size,
                    Err(err) => {
                        self.status.record(surface, Some(instance.id()), err);
                        Resolution::default()
                    }
                };
                let name = instance
                    .model_arc()
                    .cameras()
                    .get(camera)
                    .map(|c| c.name.clone())
                    .unwrap_or_default();
                names.push(name);
                sizes.push(size);
            }
            instance.publish_camera_layout(CameraInterface::new(names, sizes));
        }

        let (tx, rx) = crossbeam_channel::unbounded();
        for window in self.registry.windows() {
            match window.initialize(&self.gfx, resolver) {
                Ok(_) => window.install_event_sender(tx.clone()),
                Err(err) => self.status.record(window, None, err),
            }
        }
        rx
    }

    /// One loop iteration. Returns `true` if a camera request was served.
    fn iterate(&self, events: &Receiver<WindowEvent>) -> bool {
        let resolver = self.registry.as_ref();

        let now = Instant::now();
        for window in self.registry.windows() {
            if window.is_exited() || !window.paint_due(now) {
                continue;
            }
            if let Ok(RenderOutcome::Closed) = window.render_once(&self.gfx, resolver) {
                tracing::info!("{} closed, bound simulations keep running", window.id());
            }
        }

        for event in events.try_iter() {
            self.dispatch(event);
        }

        let mut served = false;
        for instance in self.registry.instances() {
            if instance.camera_pending() {
                instance.serve_camera_request(&self.gfx, resolver);
                served = true;
            }
        }
        served
    }

    fn dispatch(&self, event: WindowEvent) {
        let target = self
            .registry
            .windows()
            .iter()
            .find(|w| w.context_id() == Some(event.context));
        if let Some(window) = target {
            window.handle_input(event.event);
        }
    }
}

struct ExitGuard {
    gfx: Arc<GraphicsLayer>,
    registry: Arc<RegistrySnapshot>,
    status: Arc<CoordinatorStatus>,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.status.set_accepting(false);
        for instance in self.registry.instances() {
            if instance.drain_camera_request() {
                tracing::debug!("{} camera request drained at shutdown", instance.id());
            }
        }

        let mut released = 0;
        for instance in self.registry.instances() {
            for surface in instance.camera_surfaces() {
                released += usize::from(surface.release(&self.gfx));
            }
        }
        for window in self.registry.windows() {
            released += usize::from(window.release(&self.gfx));
        }
        self.status.released.store(released, Ordering::Release);

        self.gfx.terminate();
        tracing::info!("render coordinator stopped, {} surfaces released", released);
    }
}
