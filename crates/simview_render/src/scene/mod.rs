//! # Scene Composition
//!
//! A surface composes one [`Scene`] per frame from every instance bound to
//! it. Instances are reached through a [`SourceResolver`], never through an
//! owning pointer.
//!
//! ```text
//! binding list:  [ sim A (primary), sim B, sim C ]
//!                     │ ALL           │ DYNAMIC  │ DYNAMIC
//!                     ▼               ▼          ▼
//! scene:         [ A static, A dynamic, B dynamic, C dynamic ]
//! ```
//!
//! Secondary instances skip static geometry, so overlaid simulations of the
//! same world do not draw the floor twice.

mod camera;

pub use camera::{CameraPose, MouseAction, ViewCamera, FREE_CAMERA_FOVY};

use simview_core::{InstanceId, SimulationModel, SimulationState};

/// Which part of a model a geom belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GeomCategory {
    /// World geometry that never moves.
    Static,
    /// Geometry attached to a moving body.
    Dynamic,
}

/// Set of geom categories to contribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GeomCategories(u8);

impl GeomCategories {
    /// Static geometry only.
    pub const STATIC: Self = Self(0b01);
    /// Dynamic geometry only.
    pub const DYNAMIC: Self = Self(0b10);
    /// Everything.
    pub const ALL: Self = Self(0b11);

    /// Returns `true` if `category` is in the set.
    #[inline]
    #[must_use]
    pub const fn contains(self, category: GeomCategory) -> bool {
        let bit = match category {
            GeomCategory::Static => Self::STATIC.0,
            GeomCategory::Dynamic => Self::DYNAMIC.0,
        };
        self.0 & bit != 0
    }
}

/// One drawable sphere in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SceneGeom {
    /// Instance this geom came from.
    pub source: InstanceId,
    /// Category.
    pub category: GeomCategory,
    /// World-space center.
    pub position: [f64; 3],
    /// Radius.
    pub radius: f64,
    /// Linear RGBA.
    pub rgba: [f32; 4],
}

/// Data uploaded to a context once, at surface init.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SceneAssets {
    /// Clear color.
    pub background: [u8; 3],
    /// Number of static geoms the primary instance will contribute.
    pub static_geoms: usize,
}

impl SceneAssets {
    /// Assets of a model.
    #[must_use]
    pub fn from_model(model: &SimulationModel) -> Self {
        Self {
            background: model.visual().background,
            static_geoms: model.static_geom_count(),
        }
    }
}

/// Counts describing a composed scene.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SceneSummary {
    /// Static geoms drawn.
    pub static_geoms: usize,
    /// Dynamic geoms drawn.
    pub dynamic_geoms: usize,
    /// `(instance, geoms contributed)` in contribution order.
    pub per_source: Vec<(InstanceId, usize)>,
    /// Geoms dropped because the scene was full.
    pub dropped: usize,
}

/// Bounded geom list rebuilt every frame.
#[derive(Clone, Debug)]
pub struct Scene {
    geoms: Vec<SceneGeom>,
    capacity: usize,
    dropped: usize,
}

impl Scene {
    /// Creates an empty scene holding at most `capacity` geoms.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            geoms: Vec::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    /// Empties the scene, keeping its allocation.
    pub fn clear(&mut self) {
        self.geoms.clear();
        self.dropped = 0;
    }

    /// Adds a geom. Returns `false` and counts a drop when full.
    pub fn push(&mut self, geom: SceneGeom) -> bool {
        if self.geoms.len() >= self.capacity {
            self.dropped += 1;
            return false;
        }
        self.geoms.push(geom);
        true
    }

    /// Geoms in draw order.
    #[must_use]
    pub fn geoms(&self) -> &[SceneGeom] {
        &self.geoms
    }

    /// Maximum number of geoms.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Adds the geoms of `model` at `state` whose category is in
    /// `categories`. Caller holds the instance's state lock.
    pub fn add_model_geoms(
        &mut self,
        source: InstanceId,
        model: &SimulationModel,
        state: &SimulationState,
        categories: GeomCategories,
    ) {
        for (index, geom) in model.geoms().iter().enumerate() {
            let category = if geom.is_static() {
                GeomCategory::Static
            } else {
                GeomCategory::Dynamic
            };
            if !categories.contains(category) {
                continue;
            }
            let Some(position) = state.geom_position(model, index) else {
                continue;
            };
            self.push(SceneGeom {
                source,
                category,
                position,
                radius: geom.radius,
                rgba: geom.rgba,
            });
        }
    }

    /// Summarizes the current contents.
    #[must_use]
    pub fn summary(&self) -> SceneSummary {
        let mut summary = SceneSummary {
            dropped: self.dropped,
            ..SceneSummary::default()
        };
        for geom in &self.geoms {
            match geom.category {
                GeomCategory::Static => summary.static_geoms += 1,
                GeomCategory::Dynamic => summary.dynamic_geoms += 1,
            }
            match summary.per_source.last_mut() {
                Some((id, count)) if *id == geom.source => *count += 1,
                _ => summary.per_source.push((geom.source, 1)),
            }
        }
        summary
    }
}

/// A simulation instance as seen by a render surface.
pub trait SceneSource: Send + Sync {
    /// Registry id of this instance.
    fn id(&self) -> InstanceId;

    /// Immutable model.
    fn model(&self) -> &SimulationModel;

    /// Locks the instance state and adds its geometry to `scene`.
    fn contribute(&self, scene: &mut Scene, categories: GeomCategories);

    /// Simulation time of the current state.
    fn sim_time(&self) -> f64;
}

/// Looks up bound instances by id.
pub trait SourceResolver: Send + Sync {
    /// Returns the instance with this id, if registered.
    fn resolve(&self, id: InstanceId) -> Option<&dyn SceneSource>;
}
