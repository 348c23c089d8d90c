//! # Render Surface
//!
//! One graphics context, window or offscreen, and everything it needs to
//! draw: the composed scene, the camera, and for offscreen surfaces the
//! pixel buffers handed back to the simulation.
//!
//! ```text
//!   Uninitialized ──initialize()──► Initialized ──render_once()*──┐
//!         │                              │                        │
//!         └──── init failure ────────────┴── release() / close ──►  Exited
//! ```
//!
//! Once exited every call returns [`SurfaceError::AlreadyExited`]. Nothing
//! is retried, and nothing propagates beyond the surface.
//!
//! ## Locks
//!
//! - `inner`: context, scene and camera. Only the thread holding the
//!   graphics lock touches it.
//! - `frame`: the pixel buffers. Written by the coordinator after a draw,
//!   read by camera copy-out on the simulation thread.
//!
//! While composing, `inner` is held and each bound instance's state lock is
//! taken and dropped in turn. The frame lock is only taken after the last
//! state lock is gone.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use simview_core::{InstanceId, Resolution, SimulationModel, SurfaceId};

use crate::backend::{ContextId, GraphicsContext, GraphicsLayer, SurfaceTarget};
use crate::error::{BackendError, SurfaceError, SurfaceResult};
use crate::frame::FrameBuffer;
use crate::input::{InputEvent, PointerState, WindowEvent};
use crate::scene::{CameraPose, GeomCategories, Scene, SceneAssets, SceneSummary, SourceResolver, ViewCamera};

/// Window parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct WindowSpec {
    /// Title bar text.
    pub title: String,
    /// Requested size.
    pub size: Resolution,
    /// Sync swaps to the display.
    pub vsync: bool,
    /// Minimum wall time between paints.
    pub frame_interval: Duration,
    /// Initial free-camera zoom.
    pub zoom: f64,
}

/// The two surface variants.
#[derive(Clone, Debug, PartialEq)]
pub enum SurfaceKind {
    /// Interactive window drawing every bound instance.
    Window(WindowSpec),
    /// Headless surface drawing one fixed model camera.
    Offscreen {
        /// Index of the model camera.
        camera: usize,
    },
}

/// Lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceState {
    /// Created, no graphics resources yet.
    Uninitialized,
    /// Context live, ready to draw.
    Initialized,
    /// Resources released. Terminal.
    Exited,
}

/// Result of one successful `render_once` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderOutcome {
    /// A frame was drawn.
    Painted,
    /// The user closed the window. Resources are released.
    Closed,
}

struct SurfaceInner {
    state: SurfaceState,
    context: Option<Box<dyn GraphicsContext>>,
    scene: Scene,
    view: Option<ViewCamera>,
    pointer: PointerState,
    viewport: Resolution,
    last_paint: Option<Instant>,
    frames: u64,
    summary: SceneSummary,
    events: Option<Sender<WindowEvent>>,
}

/// A window or offscreen render target.
pub struct RenderSurface {
    id: SurfaceId,
    kind: SurfaceKind,
    /// Bound instances. The first is primary.
    bindings: Mutex<Vec<InstanceId>>,
    inner: Mutex<SurfaceInner>,
    frame: Mutex<FrameBuffer>,
    exited: AtomicBool,
}

impl RenderSurface {
    /// Creates an uninitialized surface whose scene holds at most
    /// `scene_capacity` geoms.
    #[must_use]
    pub fn new(id: SurfaceId, kind: SurfaceKind, scene_capacity: usize) -> Self {
        Self {
            id,
            kind,
            bindings: Mutex::new(Vec::new()),
            inner: Mutex::new(SurfaceInner {
                state: SurfaceState::Uninitialized,
                context: None,
                scene: Scene::with_capacity(scene_capacity),
                view: None,
                pointer: PointerState::default(),
                viewport: Resolution::default(),
                last_paint: None,
                frames: 0,
                summary: SceneSummary::default(),
                events: None,
            }),
            frame: Mutex::new(FrameBuffer::default()),
            exited: AtomicBool::new(false),
        }
    }

    /// Surface id.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> SurfaceId {
        self.id
    }

    /// Variant.
    #[must_use]
    pub const fn kind(&self) -> &SurfaceKind {
        &self.kind
    }

    /// Returns `true` for window surfaces.
    #[must_use]
    pub const fn is_window(&self) -> bool {
        matches!(self.kind, SurfaceKind::Window(_))
    }

    /// Model camera drawn by an offscreen surface.
    #[must_use]
    pub const fn camera(&self) -> Option<usize> {
        match self.kind {
            SurfaceKind::Offscreen { camera } => Some(camera),
            SurfaceKind::Window(_) => None,
        }
    }

    /// Returns `true` once the surface has exited. Lock-free.
    #[must_use]
    pub fn is_exited(&self) -> bool {
        self.exited.load(Ordering::Acquire)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SurfaceState {
        self.inner.lock().state
    }

    /// Binds an instance. The first bound instance is primary.
    pub fn bind(&self, instance: InstanceId) {
        self.bindings.lock().push(instance);
    }

    /// Bound instances in binding order.
    #[must_use]
    pub fn bindings(&self) -> Vec<InstanceId> {
        self.bindings.lock().clone()
    }

    /// Primary instance.
    #[must_use]
    pub fn primary(&self) -> Option<InstanceId> {
        self.bindings.lock().first().copied()
    }

    /// Id of the live context, if any.
    #[must_use]
    pub fn context_id(&self) -> Option<ContextId> {
        self.inner.lock().context.as_ref().map(|c| c.id())
    }

    /// Viewport granted at init.
    #[must_use]
    pub fn viewport(&self) -> Resolution {
        self.inner.lock().viewport
    }

    /// Frames drawn so far.
    #[must_use]
    pub fn frames_rendered(&self) -> u64 {
        self.inner.lock().frames
    }

    /// Summary of the last composed scene.
    #[must_use]
    pub fn scene_summary(&self) -> SceneSummary {
        self.inner.lock().summary.clone()
    }

    /// Free camera of a window.
    #[must_use]
    pub fn view_camera(&self) -> Option<ViewCamera> {
        self.inner.lock().view
    }

    /// Routes this window's polled input events into `sender`.
    pub fn install_event_sender(&self, sender: Sender<WindowEvent>) {
        self.inner.lock().events = Some(sender);
    }

    /// Runs `f` with the pixel buffers under the buffer lock.
    pub fn with_frame<R>(&self, f: impl FnOnce(&FrameBuffer) -> R) -> R {
        f(&self.frame.lock())
    }

    /// Returns `true` if a window is due for a paint at `now`.
    #[must_use]
    pub fn paint_due(&self, now: Instant) -> bool {
        let SurfaceKind::Window(spec) = &self.kind else {
            return false;
        };
        match self.inner.lock().last_paint {
            Some(last) => now.duration_since(last) > spec.frame_interval,
            None => true,
        }
    }

    /// Creates the context and uploads static assets.
    ///
    /// Returns the granted viewport. On failure the surface exits and the
    /// error is returned to the caller for reporting, never raised further.
    pub fn initialize(&self, gfx: &GraphicsLayer, resolver: &dyn SourceResolver) -> SurfaceResult<Resolution> {
        let _gfx = gfx.enter();
        let mut inner = self.inner.lock();
        match inner.state {
            SurfaceState::Exited => return Err(SurfaceError::AlreadyExited),
            SurfaceState::Initialized => return Ok(inner.viewport),
            SurfaceState::Uninitialized => {}
        }

        let result = self.create(gfx, resolver, &mut inner);
        match result {
            Ok(viewport) => {
                inner.viewport = viewport;
                inner.state = SurfaceState::Initialized;
                tracing::info!(
                    "{} initialized ({}x{})",
                    self.id,
                    viewport.width,
                    viewport.height
                );
                Ok(viewport)
            }
            Err(err) => {
                tracing::warn!("{} failed to initialize: {}", self.id, err);
                self.exit(&mut inner);
                Err(err)
            }
        }
    }

    fn create(
        &self,
        gfx: &GraphicsLayer,
        resolver: &dyn SourceResolver,
        inner: &mut SurfaceInner,
    ) -> SurfaceResult<Resolution> {
        gfx.ensure_init().map_err(SurfaceError::BackendInit)?;

        let primary = self.primary().ok_or(SurfaceError::UnknownTarget)?;
        let source = resolver.resolve(primary).ok_or(SurfaceError::UnknownTarget)?;
        let model = source.model();

        match &self.kind {
            SurfaceKind::Window(spec) => {
                let target = SurfaceTarget::Window {
                    title: spec.title.clone(),
                    size: spec.size,
                    vsync: spec.vsync,
                };
                let mut context = gfx
                    .backend()
                    .create_context(&target)
                    .map_err(SurfaceError::ContextCreation)?;
                context.upload_assets(&SceneAssets::from_model(model));
                let viewport = context.framebuffer_size();
                inner.view = Some(ViewCamera::for_model(model.stats(), spec.zoom));
                inner.context = Some(context);
                Ok(viewport)
            }
            SurfaceKind::Offscreen { camera } => {
                if *camera >= model.cameras().len() {
                    return Err(SurfaceError::UnknownTarget);
                }
                let target = SurfaceTarget::Offscreen {
                    size: model.visual().offscreen,
                };
                let mut context = gfx.backend().create_context(&target).map_err(offscreen_error)?;
                let viewport = context.max_viewport();
                // The context exists from here on, so failures must destroy it.
                let frame = match FrameBuffer::allocate(viewport) {
                    Ok(frame) => frame,
                    Err(err) => {
                        context.destroy();
                        return Err(err);
                    }
                };
                context.upload_assets(&SceneAssets::from_model(model));
                *self.frame.lock() = frame;
                inner.context = Some(context);
                Ok(viewport)
            }
        }
    }

    /// Composes the bound instances and draws one frame.
    ///
    /// Window: swaps buffers and forwards polled input events. Offscreen:
    /// reads the pixels into the frame buffer.
    pub fn render_once(&self, gfx: &GraphicsLayer, resolver: &dyn SourceResolver) -> SurfaceResult<RenderOutcome> {
        let _gfx = gfx.enter();
        let mut inner = self.inner.lock();
        match inner.state {
            SurfaceState::Exited => return Err(SurfaceError::AlreadyExited),
            SurfaceState::Uninitialized => return Err(SurfaceError::NotInitialized),
            SurfaceState::Initialized => {}
        }

        if self.is_window() && inner.context.as_ref().is_some_and(|c| c.should_close()) {
            tracing::info!("{} closed by user", self.id);
            self.exit(&mut inner);
            return Ok(RenderOutcome::Closed);
        }

        let bindings = self.bindings();
        let Some(primary) = bindings.first().and_then(|id| resolver.resolve(*id)) else {
            return Err(SurfaceError::UnknownTarget);
        };
        let pose = match self.pose(&inner, primary.model()) {
            Some(pose) => pose,
            None => return Err(SurfaceError::UnknownTarget),
        };
        let sim_time = primary.sim_time();

        let SurfaceInner { scene, context, viewport, .. } = &mut *inner;
        scene.clear();
        for (slot, id) in bindings.iter().enumerate() {
            let Some(source) = resolver.resolve(*id) else {
                continue;
            };
            let categories = if slot == 0 {
                GeomCategories::ALL
            } else {
                GeomCategories::DYNAMIC
            };
            source.contribute(scene, categories);
        }

        let Some(context) = context.as_mut() else {
            return Err(SurfaceError::NotInitialized);
        };
        let viewport = *viewport;
        let drawn = context.render(scene, &pose, viewport).and_then(|()| {
            if self.is_window() {
                context.swap_buffers();
                Ok(())
            } else {
                let mut frame = self.frame.lock();
                let (rgb, depth) = frame.planes_mut();
                context.read_pixels(viewport, rgb, depth)?;
                frame.set_sim_time(sim_time);
                Ok(())
            }
        });

        if let Err(err) = drawn {
            tracing::error!("{} render failed: {}", self.id, err);
            self.exit(&mut inner);
            return Err(SurfaceError::RenderFailed(err));
        }

        inner.summary = inner.scene.summary();
        inner.last_paint = Some(Instant::now());
        inner.frames += 1;

        if self.is_window() {
            let events = gfx.backend().poll_events();
            if let Some(sender) = &inner.events {
                for event in events {
                    // Receiver gone means the coordinator is shutting down.
                    let _ = sender.send(event);
                }
            }
        }
        tracing::trace!("{} painted frame {}", self.id, inner.frames);
        Ok(RenderOutcome::Painted)
    }

    fn pose(&self, inner: &SurfaceInner, model: &SimulationModel) -> Option<CameraPose> {
        let (near, far) = model.depth_range();
        match &self.kind {
            SurfaceKind::Window(_) => inner.view.map(|view| view.pose(near, far)),
            SurfaceKind::Offscreen { camera } => model
                .cameras()
                .get(*camera)
                .map(|def| CameraPose::from_camera(def, near, far)),
        }
    }

    /// Applies a pointer event to a window's free camera.
    pub fn handle_input(&self, event: InputEvent) {
        let mut inner = self.inner.lock();
        if inner.state != SurfaceState::Initialized {
            return;
        }
        let height = inner.viewport.height;
        if let Some((action, dx, dy)) = inner.pointer.apply(event, height) {
            if let Some(view) = inner.view.as_mut() {
                view.move_camera(action, dx, dy);
            }
        }
    }

    /// Releases graphics resources. Returns `true` if this call released
    /// them; later calls do nothing.
    pub fn release(&self, gfx: &GraphicsLayer) -> bool {
        let _gfx = gfx.enter();
        let mut inner = self.inner.lock();
        if inner.state == SurfaceState::Exited {
            return false;
        }
        self.exit(&mut inner);
        tracing::debug!("{} released", self.id);
        true
    }

    fn exit(&self, inner: &mut SurfaceInner) {
        if let Some(context) = inner.context.take() {
            context.destroy();
        }
        inner.events = None;
        inner.state = SurfaceState::Exited;
        self.exited.store(true, Ordering::Release);
    }
}

fn offscreen_error(err: BackendError) -> SurfaceError {
    match err {
        BackendError::OffscreenUnsupported => SurfaceError::OffscreenUnsupported,
        other => SurfaceError::ContextCreation(other),
    }
}

/// Probes the offscreen viewport the backend grants for `model`'s cameras,
/// without creating a surface.
///
/// Safe to call from any thread: it holds the graphics lock throughout.
pub fn measure_offscreen_viewport(gfx: &GraphicsLayer, model: &SimulationModel) -> SurfaceResult<Resolution> {
    let _gfx = gfx.enter();
    gfx.ensure_init().map_err(SurfaceError::BackendInit)?;
    let target = SurfaceTarget::Offscreen {
        size: model.visual().offscreen,
    };
    let context = gfx.backend().create_context(&target).map_err(offscreen_error)?;
    let viewport = context.max_viewport();
    context.destroy();
    Ok(viewport)
}

impl std::fmt::Debug for RenderSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderSurface")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("exited", &self.is_exited())
            .finish_non_exhaustive()
    }
}
