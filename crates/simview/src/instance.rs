//! # Simulation Instance
//!
//! One model, its mutable state, and the offscreen surfaces for its cameras.
//!
//! ```text
//!  driving thread                       render coordinator
//!  ──────────────                       ──────────────────
//!  step()        ── state lock ──┐
//!  read_sensors() ─ state lock ──┤      render_once() per camera
//!                                ├───── contribute() ── state lock
//!  request_camera_frame():       │
//!    pending = true              │      sees pending
//!    acquire() ─── blocks ───────┘      renders, stamps time, fresh = true
//!                                       pending = false, release()
//!  get_camera_rgb() ── buffer lock ──── (written under the same lock)
//! ```
//!
//! The state lock is never held across `acquire()`. The coordinator needs
//! that lock to compose the very frame being waited for.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use simview_core::{
    CameraInterface, CameraSchedule, CameraSpec, HandoffSemaphore, InstanceId, PhysicsOracle,
    SimulationModel, SimulationState,
};
use simview_render::{
    GeomCategories, GraphicsLayer, RenderOutcome, RenderSurface, Scene, SceneSource, SourceResolver,
};

use crate::coordinator::CoordinatorStatus;
use crate::error::{SimError, SimResult};

struct Physics {
    state: SimulationState,
    oracle: Box<dyn PhysicsOracle>,
}

/// Camera rendezvous bookkeeping.
struct CameraSync {
    schedule: CameraSchedule,
    /// Set by the driving thread, cleared by whoever consumes the request.
    pending: AtomicBool,
    /// Set by the coordinator after a served request painted something.
    fresh: AtomicBool,
    /// Set by the coordinator when it served (not drained) a request.
    served: AtomicBool,
    /// Simulation time of the last served request, as `f64` bits.
    last_render_time: AtomicU64,
    handoff: HandoffSemaphore,
}

/// A simulation stepped by one external driving thread.
pub struct SimulationInstance {
    id: InstanceId,
    model: Arc<SimulationModel>,
    physics: Mutex<Physics>,
    camera: CameraSync,
    /// Offscreen surfaces, one per model camera, in camera order.
    cameras: Vec<RenderSurface>,
    /// Granted camera sizes, published by the coordinator after init.
    camera_layout: Mutex<CameraInterface>,
}

impl SimulationInstance {
    /// Creates an instance at time zero owning `cameras`.
    pub(crate) fn new(
        id: InstanceId,
        model: Arc<SimulationModel>,
        oracle: Box<dyn PhysicsOracle>,
        schedule: CameraSchedule,
        cameras: Vec<RenderSurface>,
    ) -> Self {
        let names = cameras
            .iter()
            .filter_map(RenderSurface::camera)
            .filter_map(|c| model.cameras().get(c).map(|def| def.name.clone()))
            .collect::<Vec<_>>();
        let sizes = vec![model.visual().offscreen; names.len()];
        Self {
            id,
            physics: Mutex::new(Physics {
                state: SimulationState::new(&model),
                oracle,
            }),
            model,
            camera: CameraSync {
                schedule,
                pending: AtomicBool::new(false),
                fresh: AtomicBool::new(false),
                served: AtomicBool::new(false),
                last_render_time: AtomicU64::new(0f64.to_bits()),
                handoff: HandoffSemaphore::new(),
            },
            cameras,
            camera_layout: Mutex::new(CameraInterface::new(names, sizes)),
        }
    }

    /// Registry id.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> InstanceId {
        self.id
    }

    /// Shared model.
    #[must_use]
    pub fn model_arc(&self) -> &Arc<SimulationModel> {
        &self.model
    }

    /// Offscreen camera surfaces.
    #[must_use]
    pub fn camera_surfaces(&self) -> &[RenderSurface] {
        &self.cameras
    }

    /// Current simulation time.
    #[must_use]
    pub fn time(&self) -> f64 {
        self.physics.lock().state.time
    }

    /// Copy of the full state.
    #[must_use]
    pub fn snapshot(&self) -> SimulationState {
        self.physics.lock().state.clone()
    }

    /// Writes `controls` and advances one timestep.
    pub fn step(&self, controls: &[f64]) -> SimResult<()> {
        let expected = self.model.actuators().len();
        if controls.len() != expected {
            return Err(SimError::ControlLength {
                expected,
                actual: controls.len(),
            });
        }
        let mut physics = self.physics.lock();
        let Physics { state, oracle } = &mut *physics;
        state.ctrl.copy_from_slice(controls);
        oracle.step(&self.model, state);
        Ok(())
    }

    /// Copies the scalars of sensor `index`.
    pub fn read_sensors(&self, index: usize) -> SimResult<Vec<f64>> {
        let count = self.model.sensors().len();
        let (Some(spec), Some(addr)) = (self.model.sensors().get(index), self.model.sensor_addr(index)) else {
            return Err(SimError::SensorIndex { index, count });
        };
        let dim = spec.kind.dim();
        let physics = self.physics.lock();
        let data = &physics.state.sensordata;
        data.get(addr..addr + dim)
            .map(<[f64]>::to_vec)
            .ok_or(SimError::SensorDataLength {
                expected: self.model.sensor_scalars(),
                actual: data.len(),
            })
    }

    /// Copies the whole flat sensor vector into `out`.
    pub fn read_all_sensors(&self, out: &mut [f64]) -> SimResult<()> {
        let needed = self.model.sensor_scalars();
        if out.len() < needed {
            return Err(SimError::BufferTooSmall {
                what: "sensor",
                needed,
                actual: out.len(),
            });
        }
        let physics = self.physics.lock();
        let data = &physics.state.sensordata;
        if data.len() != needed {
            return Err(SimError::SensorDataLength {
                expected: needed,
                actual: data.len(),
            });
        }
        out[..needed].copy_from_slice(data);
        Ok(())
    }

    /// Simulation time of the last served camera request.
    #[must_use]
    pub fn last_render_time(&self) -> f64 {
        f64::from_bits(self.camera.last_render_time.load(Ordering::Acquire))
    }

    /// Returns `true` if this instance has cameras and a full sampling
    /// interval has elapsed since the last frame.
    #[must_use]
    pub fn camera_due(&self) -> bool {
        if self.cameras.iter().all(RenderSurface::is_exited) {
            return false;
        }
        self.camera.schedule.is_due(self.time(), self.last_render_time())
    }

    /// Returns `true` while a request waits for the coordinator.
    #[must_use]
    pub fn camera_pending(&self) -> bool {
        self.camera.pending.load(Ordering::SeqCst)
    }

    /// Asks the coordinator for a frame at the current simulation time and
    /// blocks until it has been rendered.
    ///
    /// Fails fast with [`SimError::CoordinatorUnavailable`] if the
    /// coordinator is not accepting requests, or stopped before serving
    /// this one.
    pub(crate) fn request_camera_frame(&self, status: &CoordinatorStatus) -> SimResult<()> {
        // No lock is held from here on.
        self.camera.served.store(false, Ordering::SeqCst);
        self.camera.pending.store(true, Ordering::SeqCst);

        if !status.is_accepting() {
            if self.camera.pending.swap(false, Ordering::SeqCst) {
                return Err(SimError::CoordinatorUnavailable);
            }
            // The coordinator drained the request on its way out and
            // released the semaphore; consume that release.
            self.camera.handoff.acquire();
            return Err(SimError::CoordinatorUnavailable);
        }

        status.wake();
        self.camera.handoff.acquire();

        if self.camera.served.swap(false, Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SimError::CoordinatorUnavailable)
        }
    }

    /// Renders every camera for a pending request and wakes the requester.
    /// Coordinator thread only.
    pub(crate) fn serve_camera_request(&self, gfx: &GraphicsLayer, resolver: &dyn SourceResolver) {
        let mut painted = false;
        for surface in &self.cameras {
            if surface.is_exited() {
                continue;
            }
            match surface.render_once(gfx, resolver) {
                Ok(RenderOutcome::Painted) => painted = true,
                Ok(RenderOutcome::Closed) => {}
                Err(err) => tracing::warn!("{} camera {} skipped: {}", self.id, surface.id(), err),
            }
        }

        let time = self.time();
        self.camera.last_render_time.store(time.to_bits(), Ordering::Release);
        if painted {
            self.camera.fresh.store(true, Ordering::Release);
        }
        self.camera.served.store(true, Ordering::SeqCst);
        self.camera.pending.store(false, Ordering::SeqCst);
        self.camera.handoff.release();
    }

    /// Releases a pending requester without rendering. Coordinator thread
    /// only, after it stopped accepting requests.
    pub(crate) fn drain_camera_request(&self) -> bool {
        if self.camera.pending.swap(false, Ordering::SeqCst) {
            self.camera.handoff.release();
            true
        } else {
            false
        }
    }

    /// Consumes the "new frame since last copy" flag.
    pub fn take_fresh(&self) -> bool {
        self.camera.fresh.swap(false, Ordering::AcqRel)
    }

    /// Publishes the granted camera sizes. Coordinator thread only.
    pub(crate) fn publish_camera_layout(&self, layout: CameraInterface) {
        *self.camera_layout.lock() = layout;
    }

    /// Current camera layout.
    #[must_use]
    pub fn camera_layout(&self) -> CameraInterface {
        self.camera_layout.lock().clone()
    }

    /// Identity and granted size of every camera.
    #[must_use]
    pub fn camera_specs(&self) -> Vec<CameraSpec> {
        let layout = self.camera_layout.lock();
        self.cameras
            .iter()
            .zip(layout.names.iter().zip(&layout.sizes))
            .filter_map(|(surface, (name, size))| {
                surface.camera().map(|id| CameraSpec {
                    id,
                    name: name.clone(),
                    resolution: *size,
                })
            })
            .collect()
    }

    /// Copies every camera's RGB image, concatenated in camera order, into
    /// `out`. Returns the number of bytes written.
    pub fn get_camera_rgb(&self, out: &mut [u8]) -> SimResult<usize> {
        let layout = self.camera_layout.lock().clone();
        if out.len() < layout.rgb_len {
            return Err(SimError::BufferTooSmall {
                what: "rgb",
                needed: layout.rgb_len,
                actual: out.len(),
            });
        }
        for (index, surface) in self.cameras.iter().enumerate() {
            let (Some(&addr), Some(size)) = (layout.rgb_addrs.get(index), layout.sizes.get(index)) else {
                continue;
            };
            let len = size.rgb_len();
            surface.with_frame(|frame| {
                let n = len.min(frame.rgb().len());
                out[addr..addr + n].copy_from_slice(&frame.rgb()[..n]);
            });
        }
        Ok(layout.rgb_len)
    }

    /// Copies every camera's depth image, concatenated in camera order,
    /// into `out`. Returns the number of values written.
    pub fn get_camera_depth(&self, out: &mut [f32]) -> SimResult<usize> {
        let layout = self.camera_layout.lock().clone();
        if out.len() < layout.depth_len {
            return Err(SimError::BufferTooSmall {
                what: "depth",
                needed: layout.depth_len,
                actual: out.len(),
            });
        }
        for (index, surface) in self.cameras.iter().enumerate() {
            let (Some(&addr), Some(size)) = (layout.depth_addrs.get(index), layout.sizes.get(index)) else {
                continue;
            };
            let len = size.pixels();
            surface.with_frame(|frame| {
                let n = len.min(frame.depth().len());
                out[addr..addr + n].copy_from_slice(&frame.depth()[..n]);
            });
        }
        Ok(layout.depth_len)
    }

    /// Simulation time shown by camera `index`'s current pixels.
    #[must_use]
    pub fn camera_frame_time(&self, index: usize) -> Option<f64> {
        self.cameras.get(index).map(|s| s.with_frame(simview_render::FrameBuffer::sim_time))
    }
}

impl SceneSource for SimulationInstance {
    fn id(&self) -> InstanceId {
        self.id
    }

    fn model(&self) -> &SimulationModel {
        &self.model
    }

    fn contribute(&self, scene: &mut Scene, categories: GeomCategories) {
        let physics = self.physics.lock();
        scene.add_model_geoms(self.id, &self.model, &physics.state, categories);
    }

    fn sim_time(&self) -> f64 {
        self.time()
    }
}

impl fmt::Debug for SimulationInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulationInstance")
            .field("id", &self.id)
            .field("model", &self.model.name())
            .field("cameras", &self.cameras.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simview_core::{BallisticOracle, SensorKind};

    fn instance() -> SimulationInstance {
        let model = SimulationModel::builder("cart")
            .timestep(0.01)
            .body("cart", [0.0, 0.0, 0.0], 0.1, [1.0; 4])
            .actuator("push", 0, [1.0, 0.0, 0.0], 1.0)
            .sensor("pos", SensorKind::BodyPosition(0))
            .sensor("force", SensorKind::ActuatorForce(0))
            .build()
            .unwrap();
        SimulationInstance::new(
            InstanceId(0),
            Arc::new(model),
            Box::new(BallisticOracle::new()),
            CameraSchedule::default(),
            Vec::new(),
        )
    }

    #[test]
    fn test_step_rejects_wrong_control_length() {
        let sim = instance();
        let err = sim.step(&[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, SimError::ControlLength { expected: 1, actual: 2 }));
        assert_eq!(sim.time(), 0.0);
    }

    #[test]
    fn test_step_applies_controls() {
        let sim = instance();
        sim.step(&[3.0]).unwrap();
        assert!((sim.time() - 0.01).abs() < 1e-12);
        assert_eq!(sim.read_sensors(1).unwrap(), vec![3.0]);
        assert!(sim.read_sensors(0).unwrap()[0] > 0.0);
    }

    #[test]
    fn test_read_sensors_out_of_range() {
        let sim = instance();
        let err = sim.read_sensors(2).unwrap_err();
        assert!(matches!(err, SimError::SensorIndex { index: 2, count: 2 }));
    }

    #[test]
    fn test_read_all_sensors() {
        let sim = instance();
        sim.step(&[1.0]).unwrap();
        let mut out = [0.0; 4];
        sim.read_all_sensors(&mut out).unwrap();
        assert_eq!(out[3], 1.0);
        let mut short = [0.0; 3];
        assert!(sim.read_all_sensors(&mut short).is_err());
    }

    #[test]
    fn test_truncated_sensordata_is_an_error() {
        let model = SimulationModel::builder("cart")
            .body("cart", [0.0, 0.0, 0.0], 0.1, [1.0; 4])
            .sensor("pos", SensorKind::BodyPosition(0))
            .build()
            .unwrap();
        let oracle = |_: &SimulationModel, state: &mut SimulationState| {
            state.time += 0.01;
            state.sensordata.truncate(1);
        };
        let sim = SimulationInstance::new(
            InstanceId(0),
            Arc::new(model),
            Box::new(oracle),
            CameraSchedule::default(),
            Vec::new(),
        );
        sim.step(&[]).unwrap();

        let err = sim.read_sensors(0).unwrap_err();
        assert!(matches!(err, SimError::SensorDataLength { expected: 3, actual: 1 }));
        let mut out = [0.0; 3];
        let err = sim.read_all_sensors(&mut out).unwrap_err();
        assert!(matches!(err, SimError::SensorDataLength { expected: 3, actual: 1 }));
        assert_eq!(out, [0.0; 3]);
    }

    #[test]
    fn test_no_cameras_never_due() {
        let sim = instance();
        for _ in 0..10 {
            sim.step(&[0.0]).unwrap();
        }
        assert!(!sim.camera_due());
    }

    #[test]
    fn test_request_without_coordinator_fails_fast() {
        let sim = instance();
        let status = CoordinatorStatus::default();
        let err = sim.request_camera_frame(&status).unwrap_err();
        assert!(matches!(err, SimError::CoordinatorUnavailable));
        assert!(!sim.camera_pending());
    }

    #[test]
    fn test_drain_releases_requester() {
        let sim = Arc::new(instance());
        let status = Arc::new(CoordinatorStatus::default());
        status.set_accepting(true);

        let requester = {
            let sim = Arc::clone(&sim);
            let status = Arc::clone(&status);
            std::thread::spawn(move || sim.request_camera_frame(&status))
        };

        while !sim.camera_pending() {
            std::thread::yield_now();
        }
        status.set_accepting(false);
        // Either side may win the pending flag; both paths end in an error.
        sim.drain_camera_request();

        let result = requester.join().unwrap();
        assert!(matches!(result, Err(SimError::CoordinatorUnavailable)));
    }

    #[test]
    fn test_empty_camera_copy() {
        let sim = instance();
        let mut rgb = [0u8; 0];
        let mut depth = [0f32; 0];
        assert_eq!(sim.get_camera_rgb(&mut rgb).unwrap(), 0);
        assert_eq!(sim.get_camera_depth(&mut depth).unwrap(), 0);
        assert!(!sim.take_fresh());
    }
}
