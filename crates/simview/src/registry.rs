//! # Registry
//!
//! Owns every simulation instance and every window surface of a run.
//!
//! ```text
//! registration (init mutex)          first tick                teardown
//! ─────────────────────────          ──────────                ────────
//! push instance, cameras, window ──► seal(): Arc snapshot ───► clear()
//!                                    iterated without locks
//! ```
//!
//! Entries are `Arc`s, so growth never moves an instance or surface that
//! someone already holds. Surfaces refer to instances by [`InstanceId`],
//! which is the instance's index in the snapshot.

use std::sync::Arc;

use parking_lot::Mutex;
use simview_core::{
    ClientSettings, ContextConfig, InstanceId, PhysicsOracle, Resolution, SimulationModel, SurfaceId,
};
use simview_render::{RenderSurface, SceneSource, SourceResolver, SurfaceKind, WindowSpec};

use crate::binding::BindingStrategy;
use crate::error::{SimError, SimResult};
use crate::instance::SimulationInstance;

/// What one registration produced.
pub(crate) struct Registration {
    pub instance: Arc<SimulationInstance>,
    pub window: Option<Arc<RenderSurface>>,
}

#[derive(Default)]
struct RegistryState {
    instances: Vec<Arc<SimulationInstance>>,
    windows: Vec<Arc<RenderSurface>>,
    /// Index into `windows` of the shared window.
    shared_window: Option<usize>,
    next_surface: u32,
    sealed: Option<Arc<RegistrySnapshot>>,
}

impl RegistryState {
    fn next_surface_id(&mut self) -> SurfaceId {
        let id = SurfaceId(self.next_surface);
        self.next_surface += 1;
        id
    }

    fn attach_window(
        &mut self,
        strategy: BindingStrategy,
        instance: InstanceId,
        spec: WindowSpec,
        scene_capacity: usize,
    ) -> Option<Arc<RenderSurface>> {
        let existing = match strategy {
            BindingStrategy::Headless => return None,
            BindingStrategy::SharedWindow => self.shared_window,
            BindingStrategy::DedicatedWindow => None,
        };
        let window = if let Some(index) = existing {
            Arc::clone(&self.windows[index])
        } else {
            let id = self.next_surface_id();
            let window = Arc::new(RenderSurface::new(id, SurfaceKind::Window(spec), scene_capacity));
            if strategy == BindingStrategy::SharedWindow {
                self.shared_window = Some(self.windows.len());
            }
            self.windows.push(Arc::clone(&window));
            window
        };
        window.bind(instance);
        Some(window)
    }
}

/// Append-only collection of instances and windows.
#[derive(Default)]
pub struct Registry {
    init: Mutex<RegistryState>,
}

impl Registry {
    /// Adds an instance with its camera surfaces and window binding.
    pub(crate) fn register(
        &self,
        model: Arc<SimulationModel>,
        oracle: Box<dyn PhysicsOracle>,
        settings: &ClientSettings,
        context: &ContextConfig,
    ) -> SimResult<Registration> {
        let mut state = self.init.lock();
        if state.sealed.is_some() {
            return Err(SimError::RegistrySealed);
        }

        let id = InstanceId(state.instances.len() as u32);
        let mut cameras = Vec::new();
        if settings.cameras {
            for camera in 0..model.cameras().len() {
                let surface = RenderSurface::new(
                    state.next_surface_id(),
                    SurfaceKind::Offscreen { camera },
                    context.scene_capacity,
                );
                surface.bind(id);
                cameras.push(surface);
            }
        }

        let strategy = BindingStrategy::from(settings.render_mode);
        let spec = WindowSpec {
            title: strategy.window_title(&context.window_title, model.name()),
            size: Resolution::new(context.window_width, context.window_height),
            vsync: settings.vsync,
            frame_interval: settings.frame_interval(),
            zoom: settings.zoom_level,
        };
        let window = state.attach_window(strategy, id, spec, context.scene_capacity);

        let instance = Arc::new(SimulationInstance::new(
            id,
            model,
            oracle,
            settings.camera_schedule(),
            cameras,
        ));
        state.instances.push(Arc::clone(&instance));
        tracing::info!(
            "registered {} ({:?}, {} cameras)",
            id,
            strategy,
            instance.camera_surfaces().len()
        );
        Ok(Registration { instance, window })
    }

    /// Freezes the collections. Later registrations fail; every call
    /// returns the same snapshot.
    pub fn seal(&self) -> Arc<RegistrySnapshot> {
        let mut state = self.init.lock();
        if let Some(snapshot) = &state.sealed {
            return Arc::clone(snapshot);
        }
        let snapshot = Arc::new(RegistrySnapshot {
            instances: state.instances.clone(),
            windows: state.windows.clone(),
        });
        state.sealed = Some(Arc::clone(&snapshot));
        snapshot
    }

    /// Returns `true` after [`seal`](Self::seal).
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.init.lock().sealed.is_some()
    }

    /// Number of registered instances.
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.init.lock().instances.len()
    }

    /// Registered windows.
    #[must_use]
    pub fn windows(&self) -> Vec<Arc<RenderSurface>> {
        self.init.lock().windows.clone()
    }

    /// Drops everything and unseals.
    pub fn clear(&self) {
        *self.init.lock() = RegistryState::default();
    }
}

/// Frozen view of the registry, shared with the coordinator.
pub struct RegistrySnapshot {
    instances: Vec<Arc<SimulationInstance>>,
    windows: Vec<Arc<RenderSurface>>,
}

impl RegistrySnapshot {
    /// Instances in id order.
    #[must_use]
    pub fn instances(&self) -> &[Arc<SimulationInstance>] {
        &self.instances
    }

    /// Window surfaces in creation order.
    #[must_use]
    pub fn windows(&self) -> &[Arc<RenderSurface>] {
        &self.windows
    }

    /// Returns `true` if there is any surface to drive.
    #[must_use]
    pub fn needs_rendering(&self) -> bool {
        !self.windows.is_empty() || self.instances.iter().any(|i| !i.camera_surfaces().is_empty())
    }
}

impl SourceResolver for RegistrySnapshot {
    fn resolve(&self, id: InstanceId) -> Option<&dyn SceneSource> {
        self.instances
            .get(id.index())
            .map(|instance| instance.as_ref() as &dyn SceneSource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simview_core::{BallisticOracle, RenderMode};

    fn model() -> Arc<SimulationModel> {
        Arc::new(
            SimulationModel::builder("rig")
                .body("ball", [0.0, 0.0, 1.0], 0.1, [1.0; 4])
                .camera("front", [0.0, -3.0, 1.0], [0.0, 0.0, 1.0], 45.0)
                .camera("side", [3.0, 0.0, 1.0], [0.0, 0.0, 1.0], 45.0)
                .build()
                .unwrap(),
        )
    }

    fn settings(mode: RenderMode) -> ClientSettings {
        ClientSettings {
            render_mode: mode,
            ..ClientSettings::default()
        }
    }

    fn register(registry: &Registry, mode: RenderMode) -> SimResult<Registration> {
        registry.register(
            model(),
            Box::new(BallisticOracle::new()),
            &settings(mode),
            &ContextConfig::default(),
        )
    }

    #[test]
    fn test_cameras_bound_to_owner() {
        let registry = Registry::default();
        let reg = register(&registry, RenderMode::None).unwrap();
        assert!(reg.window.is_none());
        let cameras = reg.instance.camera_surfaces();
        assert_eq!(cameras.len(), 2);
        assert_eq!(cameras[1].camera(), Some(1));
        assert_eq!(cameras[0].bindings(), vec![InstanceId(0)]);
    }

    #[test]
    fn test_shared_window_is_first_global() {
        let registry = Registry::default();
        let local = register(&registry, RenderMode::Local).unwrap();
        let a = register(&registry, RenderMode::Global).unwrap();
        let b = register(&registry, RenderMode::Global).unwrap();

        let local_window = local.window.unwrap();
        let shared = a.window.unwrap();
        assert!(Arc::ptr_eq(&shared, &b.window.unwrap()));
        assert!(!Arc::ptr_eq(&shared, &local_window));
        assert_eq!(local_window.bindings(), vec![InstanceId(0)]);
        assert_eq!(shared.bindings(), vec![InstanceId(1), InstanceId(2)]);
        assert_eq!(shared.primary(), Some(InstanceId(1)));
        assert_eq!(registry.windows().len(), 2);
    }

    #[test]
    fn test_surface_ids_unique() {
        let registry = Registry::default();
        let a = register(&registry, RenderMode::Local).unwrap();
        let b = register(&registry, RenderMode::Local).unwrap();
        let mut ids: Vec<SurfaceId> = [&a, &b]
            .iter()
            .flat_map(|r| r.instance.camera_surfaces().iter().map(RenderSurface::id))
            .chain(registry.windows().iter().map(|w| w.id()))
            .collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 6);
    }

    #[test]
    fn test_sealed_rejects_registration() {
        let registry = Registry::default();
        register(&registry, RenderMode::None).unwrap();
        let first = registry.seal();
        let second = registry.seal();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(matches!(register(&registry, RenderMode::None), Err(SimError::RegistrySealed)));

        registry.clear();
        assert!(!registry.is_sealed());
        assert!(register(&registry, RenderMode::None).is_ok());
    }

    #[test]
    fn test_snapshot_resolves_by_id() {
        let registry = Registry::default();
        register(&registry, RenderMode::None).unwrap();
        register(&registry, RenderMode::None).unwrap();
        let snapshot = registry.seal();
        assert_eq!(snapshot.resolve(InstanceId(1)).map(|s| s.id()), Some(InstanceId(1)));
        assert!(snapshot.resolve(InstanceId(2)).is_none());
        assert!(snapshot.needs_rendering());
    }
}
