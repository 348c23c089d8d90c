//! # Software Backend
//!
//! CPU implementation of the graphics seam. Windows are virtual: they never
//! appear on screen, but they accept injected pointer events and close
//! requests exactly like real ones. Geoms are drawn as shaded disks with a
//! z-buffer, producing RGB and the same nonlinear depth a GPU would.
//!
//! Every instance is a cheap handle onto shared state, so a test can keep a
//! clone to inject events and read counters while the coordinator owns the
//! other.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use simview_core::Resolution;

use super::{ContextId, GraphicsBackend, GraphicsContext, SurfaceTarget};
use crate::error::{BackendError, BackendResult};
use crate::input::{InputEvent, WindowEvent};
use crate::scene::{CameraPose, Scene, SceneAssets};

/// Capabilities and failure switches of a [`SoftwareBackend`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SoftwareConfig {
    /// Largest offscreen framebuffer handed out.
    pub max_offscreen: Resolution,
    /// Whether offscreen contexts can be created at all.
    pub offscreen_supported: bool,
    /// Make `init` fail.
    pub fail_init: bool,
    /// Make window creation fail.
    pub fail_windows: bool,
}

impl Default for SoftwareConfig {
    fn default() -> Self {
        Self {
            max_offscreen: Resolution::new(4096, 4096),
            offscreen_supported: true,
            fail_init: false,
            fail_windows: false,
        }
    }
}

/// Counters kept by a [`SoftwareBackend`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SoftwareStats {
    /// Calls to `init`.
    pub inits: u64,
    /// Calls to `terminate`.
    pub terminations: u64,
    /// Windows created.
    pub windows_created: u64,
    /// Offscreen contexts created.
    pub offscreen_created: u64,
    /// Contexts destroyed.
    pub contexts_destroyed: u64,
    /// Frames drawn over all contexts.
    pub frames_rendered: u64,
    /// Buffer swaps over all windows.
    pub swaps: u64,
    /// Pixel reads over all offscreen contexts.
    pub pixel_reads: u64,
}

impl SoftwareStats {
    /// Contexts created and not yet destroyed.
    #[must_use]
    pub const fn live_contexts(&self) -> u64 {
        self.windows_created + self.offscreen_created - self.contexts_destroyed
    }
}

struct Shared {
    config: SoftwareConfig,
    stats: Mutex<SoftwareStats>,
    next_id: AtomicU64,
    events: Mutex<VecDeque<WindowEvent>>,
    close_requests: Mutex<HashSet<ContextId>>,
    windows: Mutex<Vec<ContextId>>,
    live: Mutex<HashSet<ContextId>>,
}

/// Cloneable handle to a CPU graphics backend.
#[derive(Clone)]
pub struct SoftwareBackend {
    shared: Arc<Shared>,
}

impl SoftwareBackend {
    /// Backend with default capabilities.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(SoftwareConfig::default())
    }

    /// Backend with explicit capabilities.
    #[must_use]
    pub fn with_config(config: SoftwareConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                stats: Mutex::new(SoftwareStats::default()),
                next_id: AtomicU64::new(1),
                events: Mutex::new(VecDeque::new()),
                close_requests: Mutex::new(HashSet::new()),
                windows: Mutex::new(Vec::new()),
                live: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// Snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> SoftwareStats {
        *self.shared.stats.lock()
    }

    /// Every window ever created, oldest first.
    #[must_use]
    pub fn window_ids(&self) -> Vec<ContextId> {
        self.shared.windows.lock().clone()
    }

    /// Returns `true` if the context exists and has not been destroyed.
    #[must_use]
    pub fn is_live(&self, id: ContextId) -> bool {
        self.shared.live.lock().contains(&id)
    }

    /// Queues an input event for `window`. Delivered on the next poll.
    pub fn inject_event(&self, window: ContextId, event: InputEvent) {
        self.shared.events.lock().push_back(WindowEvent { context: window, event });
    }

    /// Marks `window` as closed by the user.
    pub fn request_close(&self, window: ContextId) {
        self.shared.close_requests.lock().insert(window);
    }
}

impl Default for SoftwareBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SoftwareBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftwareBackend")
            .field("config", &self.shared.config)
            .field("stats", &self.stats())
            .finish()
    }
}

impl GraphicsBackend for SoftwareBackend {
    fn name(&self) -> &'static str {
        "software"
    }

    fn init(&self) -> BackendResult<()> {
        self.shared.stats.lock().inits += 1;
        if self.shared.config.fail_init {
            return Err(BackendError::Init("software backend configured to fail".to_owned()));
        }
        Ok(())
    }

    fn create_context(&self, target: &SurfaceTarget) -> BackendResult<Box<dyn GraphicsContext>> {
        let config = &self.shared.config;
        let (window, size) = match target {
            SurfaceTarget::Window { title, size, .. } => {
                if config.fail_windows {
                    return Err(BackendError::WindowCreation(format!("cannot open '{title}'")));
                }
                (true, *size)
            }
            SurfaceTarget::Offscreen { size } => {
                if !config.offscreen_supported {
                    return Err(BackendError::OffscreenUnsupported);
                }
                let granted = Resolution::new(
                    size.width.min(config.max_offscreen.width),
                    size.height.min(config.max_offscreen.height),
                );
                (false, granted)
            }
        };

        let id = ContextId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        {
            let mut stats = self.shared.stats.lock();
            if window {
                stats.windows_created += 1;
            } else {
                stats.offscreen_created += 1;
            }
        }
        if window {
            self.shared.windows.lock().push(id);
        }
        self.shared.live.lock().insert(id);

        Ok(Box::new(SoftwareContext {
            id,
            window,
            size,
            background: [0; 3],
            color: Vec::new(),
            depth: Vec::new(),
            rendered: Resolution::default(),
            shared: Arc::clone(&self.shared),
        }))
    }

    fn poll_events(&self) -> Vec<WindowEvent> {
        let live = self.shared.live.lock();
        self.shared
            .events
            .lock()
            .drain(..)
            .filter(|e| live.contains(&e.context))
            .collect()
    }

    fn terminate(&self) {
        self.shared.stats.lock().terminations += 1;
    }
}

struct SoftwareContext {
    id: ContextId,
    window: bool,
    size: Resolution,
    background: [u8; 3],
    color: Vec<u8>,
    depth: Vec<f32>,
    rendered: Resolution,
    shared: Arc<Shared>,
}

impl SoftwareContext {
    fn clear(&mut self, viewport: Resolution) {
        let pixels = viewport.pixels();
        self.color.clear();
        self.color.reserve(pixels * 3);
        for _ in 0..pixels {
            self.color.extend_from_slice(&self.background);
        }
        self.depth.clear();
        self.depth.resize(pixels, 1.0);
    }

    fn rasterize(&mut self, scene: &Scene, pose: &CameraPose, viewport: Resolution) {
        let (w, h) = (f64::from(viewport.width), f64::from(viewport.height));
        let aspect = w / h;
        let focal = 1.0 / (pose.fovy.to_radians() * 0.5).tan();
        let (near, far) = (pose.near, pose.far);

        for geom in scene.geoms() {
            let [x, y, z] = pose.to_camera_space(geom.position);
            if z <= near || z >= far {
                continue;
            }
            let sx = (x * focal / (z * aspect) + 1.0) * 0.5 * w;
            let sy = (1.0 - y * focal / z) * 0.5 * h;
            let radius = geom.radius * focal / z * 0.5 * h;
            let depth = (far * (z - near) / (z * (far - near))).clamp(0.0, 1.0) as f32;
            let rgb = [
                (geom.rgba[0].clamp(0.0, 1.0) * 255.0).round() as u8,
                (geom.rgba[1].clamp(0.0, 1.0) * 255.0).round() as u8,
                (geom.rgba[2].clamp(0.0, 1.0) * 255.0).round() as u8,
            ];

            let x0 = (sx - radius).floor().max(0.0) as usize;
            let x1 = (sx + radius).ceil().min(w).max(0.0) as usize;
            let y0 = (sy - radius).floor().max(0.0) as usize;
            let y1 = (sy + radius).ceil().min(h).max(0.0) as usize;
            let r2 = radius * radius;
            let width = viewport.width as usize;

            for py in y0..y1 {
                let dy = py as f64 + 0.5 - sy;
                for px in x0..x1 {
                    let dx = px as f64 + 0.5 - sx;
                    if dx * dx + dy * dy > r2 {
                        continue;
                    }
                    let index = py * width + px;
                    if depth < self.depth[index] {
                        self.depth[index] = depth;
                        self.color[3 * index..3 * index + 3].copy_from_slice(&rgb);
                    }
                }
            }
        }
    }
}

impl GraphicsContext for SoftwareContext {
    fn id(&self) -> ContextId {
        self.id
    }

    fn max_viewport(&self) -> Resolution {
        self.size
    }

    fn framebuffer_size(&self) -> Resolution {
        self.size
    }

    fn upload_assets(&mut self, assets: &SceneAssets) {
        self.background = assets.background;
    }

    fn render(&mut self, scene: &Scene, pose: &CameraPose, viewport: Resolution) -> BackendResult<()> {
        if viewport.width > self.size.width || viewport.height > self.size.height || viewport.is_empty() {
            return Err(BackendError::ViewportMismatch {
                requested: viewport,
                rendered: self.size,
            });
        }
        self.clear(viewport);
        self.rasterize(scene, pose, viewport);
        self.rendered = viewport;
        self.shared.stats.lock().frames_rendered += 1;
        Ok(())
    }

    fn swap_buffers(&mut self) {
        if self.window {
            self.shared.stats.lock().swaps += 1;
        }
    }

    fn should_close(&self) -> bool {
        self.window && self.shared.close_requests.lock().contains(&self.id)
    }

    fn read_pixels(&mut self, viewport: Resolution, rgb: &mut [u8], depth: &mut [f32]) -> BackendResult<()> {
        if viewport != self.rendered || rgb.len() < self.color.len() || depth.len() < self.depth.len() {
            return Err(BackendError::ViewportMismatch {
                requested: viewport,
                rendered: self.rendered,
            });
        }
        rgb[..self.color.len()].copy_from_slice(&self.color);
        depth[..self.depth.len()].copy_from_slice(&self.depth);
        self.shared.stats.lock().pixel_reads += 1;
        Ok(())
    }

    fn destroy(self: Box<Self>) {
        self.shared.live.lock().remove(&self.id);
        self.shared.stats.lock().contexts_destroyed += 1;
    }
}
