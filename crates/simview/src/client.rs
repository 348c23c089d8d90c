//! # Simulation Clients
//!
//! The explicit context object of a run and the per-simulation handles
//! registered with it.
//!
//! ```text
//!  register_client ×N          first update()                 last terminate()
//!  ──────────────────          ──────────────                 ────────────────
//!  registry.register()  ──►    seal registry            ──►   shutdown coordinator
//!  active += 1                 spawn coordinator               join, collect init errors
//!                              (only if any surface)           clear registry, reset flags
//!                                                              terminate graphics
//! ```
//!
//! Teardown is reference-counted by active clients. It is safe whether or
//! not the coordinator ever started, and after partial init failures.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;
use simview_core::{
    CameraInterface, CameraSpec, ClientSettings, ContextConfig, ControlInterface, InterfaceLayout,
    PhysicsOracle, Resolution, SensorInterface, SimulationModel,
};
use simview_render::{measure_offscreen_viewport, GraphicsBackend, GraphicsLayer, RenderSurface};

use crate::coordinator::{self, CoordinatorStatus, RenderInitError};
use crate::error::{SimError, SimResult};
use crate::instance::SimulationInstance;
use crate::registry::Registry;

// ============================================================================
// INTERFACE
// ============================================================================

/// Everything a client reads and writes, with sizes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientInterface {
    /// Control vector layout.
    pub controls: ControlInterface,
    /// Sensor vector layout.
    pub sensors: SensorInterface,
    /// Camera image layout.
    pub cameras: CameraInterface,
}

impl ClientInterface {
    /// Summary sizes.
    #[must_use]
    pub const fn layout(&self) -> InterfaceLayout {
        InterfaceLayout::new(&self.controls, &self.sensors, &self.cameras)
    }
}

/// Caller-owned output buffers sized for one [`ClientInterface`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClientOutputs {
    /// Flat sensor vector.
    pub sensors: Vec<f64>,
    /// RGB bytes of every camera, concatenated in camera order.
    pub rgb: Vec<u8>,
    /// Depth values of every camera, concatenated in camera order.
    pub depth: Vec<f32>,
}

impl ClientOutputs {
    /// Zeroed buffers for `interface`.
    #[must_use]
    pub fn new(interface: &ClientInterface) -> Self {
        Self {
            sensors: vec![0.0; interface.sensors.scalar_count],
            rgb: vec![0; interface.cameras.rgb_len],
            depth: vec![0.0; interface.cameras.depth_len],
        }
    }
}

/// What the last client to leave a run learns about it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// Surfaces that failed to initialize during the run.
    pub render_init_errors: Vec<RenderInitError>,
    /// Surfaces whose graphics resources were released at shutdown.
    pub surfaces_released: usize,
    /// Whether a coordinator ran at all.
    pub coordinator_ran: bool,
}

// ============================================================================
// CONTEXT
// ============================================================================

#[derive(Default)]
struct Lifecycle {
    coordinator: Option<JoinHandle<()>>,
    active: usize,
}

/// One rendering run: graphics layer, registry and coordinator.
pub struct SimContext {
    config: ContextConfig,
    gfx: Arc<GraphicsLayer>,
    registry: Registry,
    status: Arc<CoordinatorStatus>,
    started: AtomicBool,
    lifecycle: Mutex<Lifecycle>,
}

impl SimContext {
    /// Creates a context driving `backend`.
    pub fn new(backend: impl GraphicsBackend + 'static, config: ContextConfig) -> SimResult<Arc<Self>> {
        config.validate()?;
        Ok(Arc::new(Self {
            config,
            gfx: Arc::new(GraphicsLayer::new(Box::new(backend))),
            registry: Registry::default(),
            status: Arc::new(CoordinatorStatus::default()),
            started: AtomicBool::new(false),
            lifecycle: Mutex::new(Lifecycle::default()),
        }))
    }

    /// Context settings.
    #[must_use]
    pub const fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// The shared graphics layer.
    #[must_use]
    pub fn graphics(&self) -> &GraphicsLayer {
        &self.gfx
    }

    /// Coordinator flags.
    #[must_use]
    pub fn status(&self) -> &CoordinatorStatus {
        &self.status
    }

    /// Registers a simulation. Must happen before any client's first tick.
    pub fn register_client(
        self: &Arc<Self>,
        model: Arc<SimulationModel>,
        oracle: Box<dyn PhysicsOracle>,
        settings: &ClientSettings,
    ) -> SimResult<SimulationClient> {
        settings.validate()?;
        let mut lifecycle = self.lifecycle.lock();
        let registration = self.registry.register(model, oracle, settings, &self.config)?;
        lifecycle.active += 1;
        Ok(SimulationClient {
            context: Arc::clone(self),
            instance: registration.instance,
            window: registration.window,
            terminated: false,
        })
    }

    /// Reports the interface a client for `model` would expose, probing the
    /// granted offscreen size of every camera on this thread.
    ///
    /// A failed measurement is logged and reported as zero-sized cameras.
    #[must_use]
    pub fn discover_interface(&self, model: &SimulationModel, settings: &ClientSettings) -> ClientInterface {
        let mut names = Vec::new();
        let mut sizes = Vec::new();
        if settings.cameras {
            for camera in model.cameras() {
                let size = match measure_offscreen_viewport(&self.gfx, model) {
                    Ok(size) => size,
                    Err(err) => {
                        tracing::warn!("camera '{}' of '{}' unavailable: {}", camera.name, model.name(), err);
                        Resolution::default()
                    }
                };
                names.push(camera.name.clone());
                sizes.push(size);
            }
        }
        ClientInterface {
            controls: ControlInterface::from_model(model),
            sensors: SensorInterface::from_model(model),
            cameras: CameraInterface::new(names, sizes),
        }
    }

    /// Windows of the current run.
    #[must_use]
    pub fn windows(&self) -> Vec<Arc<RenderSurface>> {
        self.registry.windows()
    }

    /// Clients registered and not yet terminated.
    #[must_use]
    pub fn active_clients(&self) -> usize {
        self.lifecycle.lock().active
    }

    /// Returns `true` while a coordinator thread is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.lifecycle
            .lock()
            .coordinator
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Seals the registry and starts the coordinator if anything needs
    /// rendering. Blocks until the coordinator has finished its init phase.
    fn ensure_started(&self) -> SimResult<()> {
        if self.started.load(Ordering::Acquire) {
            return Ok(());
        }
        let mut lifecycle = self.lifecycle.lock();
        if self.started.load(Ordering::Acquire) {
            return Ok(());
        }
        let snapshot = self.registry.seal();
        if snapshot.needs_rendering() {
            let handle = coordinator::spawn(
                Arc::clone(&self.gfx),
                snapshot,
                Arc::clone(&self.status),
                self.config.idle_park(),
            )?;
            lifecycle.coordinator = Some(handle);
        } else {
            tracing::info!("no surfaces registered, render coordinator not started");
        }
        self.started.store(true, Ordering::Release);
        Ok(())
    }

    fn leave(&self) -> Option<TeardownReport> {
        let mut lifecycle = self.lifecycle.lock();
        lifecycle.active = lifecycle.active.saturating_sub(1);
        if lifecycle.active > 0 {
            return None;
        }

        let coordinator_ran = if let Some(handle) = lifecycle.coordinator.take() {
            self.status.request_shutdown();
            if handle.join().is_err() {
                tracing::error!("render coordinator panicked");
            }
            true
        } else {
            false
        };

        let render_init_errors = self.status.take_init_errors();
        for err in &render_init_errors {
            tracing::warn!("{} failed to initialize (code {}): {}", err.surface, err.code(), err.error);
        }
        let report = TeardownReport {
            render_init_errors,
            surfaces_released: self.status.surfaces_released(),
            coordinator_ran,
        };

        self.registry.clear();
        self.status.reset();
        self.started.store(false, Ordering::Release);
        // Discovery may have brought the backend up without a coordinator.
        self.gfx.terminate();
        tracing::info!("simulation run torn down, {} surfaces released", report.surfaces_released);
        Some(report)
    }
}

impl std::fmt::Debug for SimContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimContext")
            .field("gfx", &self.gfx)
            .field("started", &self.started.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

// ============================================================================
// CLIENT
// ============================================================================

/// Handle of one registered simulation, driven by one thread.
///
/// Dropping the handle terminates it.
#[derive(Debug)]
pub struct SimulationClient {
    context: Arc<SimContext>,
    instance: Arc<SimulationInstance>,
    window: Option<Arc<RenderSurface>>,
    terminated: bool,
}

impl SimulationClient {
    /// The instance behind this client.
    #[must_use]
    pub fn instance(&self) -> &Arc<SimulationInstance> {
        &self.instance
    }

    /// The window this client is drawn in, if any.
    #[must_use]
    pub fn window(&self) -> Option<&Arc<RenderSurface>> {
        self.window.as_ref()
    }

    /// Current simulation time.
    #[must_use]
    pub fn time(&self) -> f64 {
        self.instance.time()
    }

    /// Current interface. Camera sizes are the granted ones once the
    /// coordinator has initialized the camera surfaces.
    #[must_use]
    pub fn interface(&self) -> ClientInterface {
        let model = self.instance.model_arc();
        ClientInterface {
            controls: ControlInterface::from_model(model),
            sensors: SensorInterface::from_model(model),
            cameras: self.instance.camera_layout(),
        }
    }

    /// Identity and granted size of every camera.
    #[must_use]
    pub fn camera_specs(&self) -> Vec<CameraSpec> {
        self.instance.camera_specs()
    }

    /// One tick: steps the physics with `controls`, then captures a camera
    /// frame if a sampling interval has elapsed.
    ///
    /// The first tick of any client seals the registry and starts the
    /// render coordinator.
    pub fn update(&mut self, controls: &[f64]) -> SimResult<()> {
        self.check_live()?;
        self.context.ensure_started()?;
        self.instance.step(controls)?;
        if self.instance.camera_due() {
            self.instance.request_camera_frame(&self.context.status)?;
        }
        Ok(())
    }

    /// Copies the scalars of sensor `index`.
    pub fn read_sensors(&self, index: usize) -> SimResult<Vec<f64>> {
        self.check_live()?;
        self.instance.read_sensors(index)
    }

    /// Fills `out` with the sensor vector and, if a frame arrived since the
    /// last call, the camera images. Returns `true` if the images were
    /// copied.
    pub fn outputs(&self, out: &mut ClientOutputs) -> SimResult<bool> {
        self.check_live()?;
        self.instance.read_all_sensors(&mut out.sensors)?;
        if !self.instance.take_fresh() {
            return Ok(false);
        }
        self.instance.get_camera_rgb(&mut out.rgb)?;
        self.instance.get_camera_depth(&mut out.depth)?;
        Ok(true)
    }

    /// Leaves the run. The last client to leave tears it down and gets the
    /// report. Later calls do nothing.
    pub fn terminate(&mut self) -> Option<TeardownReport> {
        if std::mem::replace(&mut self.terminated, true) {
            return None;
        }
        tracing::debug!("{} terminated", self.instance.id());
        self.context.leave()
    }

    /// Returns `true` after [`terminate`](Self::terminate).
    #[must_use]
    pub const fn is_terminated(&self) -> bool {
        self.terminated
    }

    fn check_live(&self) -> SimResult<()> {
        if self.terminated {
            Err(SimError::Terminated)
        } else {
            Ok(())
        }
    }
}

impl Drop for SimulationClient {
    fn drop(&mut self) {
        self.terminate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simview_core::{BallisticOracle, RenderMode, SensorKind};
    use simview_render::{SoftwareBackend, SoftwareConfig};

    fn model() -> Arc<SimulationModel> {
        Arc::new(
            SimulationModel::builder("drop")
                .timestep(0.002)
                .body("ball", [0.0, 0.0, 1.0], 0.1, [1.0, 0.2, 0.2, 1.0])
                .static_geom("floor", [0.0, 0.0, -0.1], 2.0, [0.5; 4])
                .actuator("lift", 0, [0.0, 0.0, 1.0], 1.0)
                .sensor("height", SensorKind::BodyPosition(0))
                .camera("front", [0.0, -3.0, 0.5], [0.0, 0.0, 0.5], 45.0)
                .build()
                .unwrap(),
        )
    }

    fn context(backend: SoftwareBackend) -> Arc<SimContext> {
        SimContext::new(backend, ContextConfig::default()).unwrap()
    }

    #[test]
    fn test_discover_interface_reports_granted_size() {
        let backend = SoftwareBackend::with_config(SoftwareConfig {
            max_offscreen: Resolution::new(64, 48),
            ..SoftwareConfig::default()
        });
        let ctx = context(backend.clone());
        let iface = ctx.discover_interface(&model(), &ClientSettings::default());

        assert_eq!(iface.controls.count, 1);
        assert_eq!(iface.sensors.scalar_count, 3);
        assert_eq!(iface.cameras.sizes, vec![Resolution::new(64, 48)]);
        assert_eq!(iface.layout().rgb_len, 64 * 48 * 3);
        assert_eq!(backend.stats().live_contexts(), 0);
    }

    #[test]
    fn test_discover_interface_without_offscreen() {
        let backend = SoftwareBackend::with_config(SoftwareConfig {
            offscreen_supported: false,
            ..SoftwareConfig::default()
        });
        let ctx = context(backend);
        let iface = ctx.discover_interface(&model(), &ClientSettings::default());
        assert_eq!(iface.cameras.count, 1);
        assert_eq!(iface.cameras.rgb_len, 0);
    }

    #[test]
    fn test_headless_run_never_starts_coordinator() {
        let ctx = context(SoftwareBackend::new());
        let settings = ClientSettings {
            cameras: false,
            ..ClientSettings::default()
        };
        let mut client = ctx
            .register_client(model(), Box::new(BallisticOracle::new()), &settings)
            .unwrap();
        for _ in 0..20 {
            client.update(&[0.0]).unwrap();
        }
        assert!(!ctx.is_running());

        let report = client.terminate().unwrap();
        assert!(!report.coordinator_ran);
        assert_eq!(report.surfaces_released, 0);
        assert_eq!(ctx.active_clients(), 0);
    }

    #[test]
    fn test_camera_frames_follow_schedule() {
        let ctx = context(SoftwareBackend::new());
        let mut client = ctx
            .register_client(model(), Box::new(BallisticOracle::new()), &ClientSettings::default())
            .unwrap();
        let mut out = ClientOutputs::new(&client.interface());

        let mut copied = Vec::new();
        for step in 1..=30 {
            client.update(&[0.0]).unwrap();
            if client.outputs(&mut out).unwrap() {
                copied.push(step);
            }
        }
        assert_eq!(copied, vec![10, 20, 30]);
        assert!(out.rgb.iter().any(|&b| b != 0));

        let report = client.terminate().unwrap();
        assert!(report.coordinator_ran);
        assert_eq!(report.surfaces_released, 1);
        assert!(report.render_init_errors.is_empty());
    }

    #[test]
    fn test_terminate_is_idempotent() {
        let ctx = context(SoftwareBackend::new());
        let mut a = ctx
            .register_client(model(), Box::new(BallisticOracle::new()), &ClientSettings::default())
            .unwrap();
        let mut b = ctx
            .register_client(model(), Box::new(BallisticOracle::new()), &ClientSettings::default())
            .unwrap();
        assert_eq!(ctx.active_clients(), 2);

        assert!(a.terminate().is_none());
        assert!(a.terminate().is_none());
        assert_eq!(ctx.active_clients(), 1);
        assert!(matches!(a.update(&[0.0]), Err(SimError::Terminated)));

        assert!(b.terminate().is_some());
        assert_eq!(ctx.active_clients(), 0);
    }

    #[test]
    fn test_local_mode_gets_window() {
        let ctx = context(SoftwareBackend::new());
        let settings = ClientSettings {
            render_mode: RenderMode::Local,
            cameras: false,
            ..ClientSettings::default()
        };
        let client = ctx
            .register_client(model(), Box::new(BallisticOracle::new()), &settings)
            .unwrap();
        let window = client.window().unwrap();
        assert!(window.is_window());
        assert_eq!(ctx.windows().len(), 1);
    }
}
