//! Simulation model topology.
//!
//! A [`SimulationModel`] is loaded once and never mutated afterwards. Every
//! simulation instance, surface and interface descriptor reads from it
//! without locking.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Pixel dimensions of a framebuffer or camera image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Resolution {
    /// Creates a resolution.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels.
    #[must_use]
    pub const fn pixels(self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Length of an RGB byte buffer at this resolution.
    #[must_use]
    pub const fn rgb_len(self) -> usize {
        3 * self.pixels()
    }

    /// Returns `true` if either dimension is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A rigid body. Bodies are point masses to the reference oracle; real
/// integrators may interpret them however they like.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BodySpec {
    /// Unique body name.
    pub name: String,
    /// Mass in kilograms.
    pub mass: f64,
    /// Position at time zero.
    pub initial_position: [f64; 3],
    /// Velocity at time zero.
    #[serde(default)]
    pub initial_velocity: [f64; 3],
}

/// A visual sphere. Geoms without a body belong to the world and are static.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeomSpec {
    /// Geom name.
    pub name: String,
    /// Owning body, or `None` for static world geometry.
    pub body: Option<usize>,
    /// Offset from the owning body (or world origin).
    #[serde(default)]
    pub offset: [f64; 3],
    /// Sphere radius.
    pub radius: f64,
    /// Color, linear RGBA in `[0, 1]`.
    pub rgba: [f32; 4],
}

impl GeomSpec {
    /// Returns `true` if this geom never moves.
    #[must_use]
    pub const fn is_static(&self) -> bool {
        self.body.is_none()
    }
}

/// A force actuator driving one body along a fixed axis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActuatorSpec {
    /// Unique actuator name.
    pub name: String,
    /// Driven body.
    pub body: usize,
    /// World-frame force axis (normalized on build).
    pub axis: [f64; 3],
    /// Force per unit of control.
    pub gear: f64,
    /// Optional `(min, max)` control clamp.
    #[serde(default)]
    pub ctrl_range: Option<(f64, f64)>,
}

/// What a sensor measures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    /// World position of a body (3 scalars).
    BodyPosition(usize),
    /// World velocity of a body (3 scalars).
    BodyVelocity(usize),
    /// Force currently produced by an actuator (1 scalar).
    ActuatorForce(usize),
    /// Simulation time (1 scalar).
    Clock,
}

impl SensorKind {
    /// Number of scalars this sensor produces.
    #[must_use]
    pub const fn dim(self) -> usize {
        match self {
            Self::BodyPosition(_) | Self::BodyVelocity(_) => 3,
            Self::ActuatorForce(_) | Self::Clock => 1,
        }
    }
}

/// A named sensor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensorSpec {
    /// Unique sensor name.
    pub name: String,
    /// Measured quantity.
    pub kind: SensorKind,
}

/// A fixed camera placed in the world.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraDef {
    /// Unique camera name.
    pub name: String,
    /// Eye position.
    pub position: [f64; 3],
    /// Point the camera looks at.
    pub target: [f64; 3],
    /// Vertical field of view in degrees.
    pub fovy: f64,
}

/// Visual parameters shared by every surface drawing this model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VisualSettings {
    /// Requested offscreen framebuffer size.
    pub offscreen: Resolution,
    /// Near clip plane as a fraction of the model extent.
    pub znear: f64,
    /// Far clip plane as a fraction of the model extent.
    pub zfar: f64,
    /// Clear color.
    pub background: [u8; 3],
}

impl Default for VisualSettings {
    fn default() -> Self {
        Self {
            offscreen: Resolution::new(640, 480),
            znear: 0.01,
            zfar: 50.0,
            background: [26, 26, 38],
        }
    }
}

/// Center and size of the model, used to frame free cameras.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModelStats {
    /// Center of the bounding box of all geometry at time zero.
    pub center: [f64; 3],
    /// Characteristic size of the model.
    pub extent: f64,
}

/// Immutable simulation topology.
#[derive(Clone, Debug)]
pub struct SimulationModel {
    name: String,
    timestep: f64,
    gravity: [f64; 3],
    bodies: Vec<BodySpec>,
    geoms: Vec<GeomSpec>,
    actuators: Vec<ActuatorSpec>,
    sensors: Vec<SensorSpec>,
    cameras: Vec<CameraDef>,
    visual: VisualSettings,
    stats: ModelStats,
    /// Start of each sensor's range in the flat sensor data array.
    sensor_addrs: Vec<usize>,
    sensor_scalars: usize,
}

impl SimulationModel {
    /// Starts building a model.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ModelBuilder {
        ModelBuilder::new(name)
    }

    /// Model name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Physics timestep in seconds. This is also the sample time a host
    /// scheduler should tick the simulation at.
    #[must_use]
    pub const fn timestep(&self) -> f64 {
        self.timestep
    }

    /// Gravity vector.
    #[must_use]
    pub const fn gravity(&self) -> [f64; 3] {
        self.gravity
    }

    /// Bodies.
    #[must_use]
    pub fn bodies(&self) -> &[BodySpec] {
        &self.bodies
    }

    /// Geoms.
    #[must_use]
    pub fn geoms(&self) -> &[GeomSpec] {
        &self.geoms
    }

    /// Actuators, in control-vector order.
    #[must_use]
    pub fn actuators(&self) -> &[ActuatorSpec] {
        &self.actuators
    }

    /// Sensors, in sensor-table order.
    #[must_use]
    pub fn sensors(&self) -> &[SensorSpec] {
        &self.sensors
    }

    /// Fixed cameras, in camera-id order.
    #[must_use]
    pub fn cameras(&self) -> &[CameraDef] {
        &self.cameras
    }

    /// Visual settings.
    #[must_use]
    pub const fn visual(&self) -> &VisualSettings {
        &self.visual
    }

    /// Framing statistics.
    #[must_use]
    pub const fn stats(&self) -> ModelStats {
        self.stats
    }

    /// Offset of sensor `index` in the flat sensor array.
    #[must_use]
    pub fn sensor_addr(&self, index: usize) -> Option<usize> {
        self.sensor_addrs.get(index).copied()
    }

    /// Total number of sensor scalars.
    #[must_use]
    pub const fn sensor_scalars(&self) -> usize {
        self.sensor_scalars
    }

    /// Number of static (world) geoms.
    #[must_use]
    pub fn static_geom_count(&self) -> usize {
        self.geoms.iter().filter(|g| g.is_static()).count()
    }

    /// Number of geoms attached to moving bodies.
    #[must_use]
    pub fn dynamic_geom_count(&self) -> usize {
        self.geoms.len() - self.static_geom_count()
    }

    /// Absolute `(near, far)` clip distances for converting depth buffer
    /// values back to metric depth.
    #[must_use]
    pub fn depth_range(&self) -> (f64, f64) {
        let extent = self.stats.extent;
        (self.visual.znear * extent, self.visual.zfar * extent)
    }
}

/// Converts a nonlinear depth-buffer value in `[0, 1]` to metric depth.
#[must_use]
pub fn linearize_depth(depth: f32, near: f64, far: f64) -> f64 {
    let d = f64::from(depth);
    near * far / (far - d * (far - near))
}

/// Builder for [`SimulationModel`].
#[derive(Clone, Debug)]
pub struct ModelBuilder {
    name: String,
    timestep: f64,
    gravity: [f64; 3],
    bodies: Vec<BodySpec>,
    geoms: Vec<GeomSpec>,
    actuators: Vec<ActuatorSpec>,
    sensors: Vec<SensorSpec>,
    cameras: Vec<CameraDef>,
    visual: VisualSettings,
}

impl ModelBuilder {
    /// Default physics timestep.
    pub const DEFAULT_TIMESTEP: f64 = 0.002;

    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timestep: Self::DEFAULT_TIMESTEP,
            gravity: [0.0, 0.0, -9.81],
            bodies: Vec::new(),
            geoms: Vec::new(),
            actuators: Vec::new(),
            sensors: Vec::new(),
            cameras: Vec::new(),
            visual: VisualSettings::default(),
        }
    }

    /// Sets the physics timestep.
    #[must_use]
    pub const fn timestep(mut self, timestep: f64) -> Self {
        self.timestep = timestep;
        self
    }

    /// Sets gravity.
    #[must_use]
    pub const fn gravity(mut self, gravity: [f64; 3]) -> Self {
        self.gravity = gravity;
        self
    }

    /// Sets visual settings.
    #[must_use]
    pub fn visual(mut self, visual: VisualSettings) -> Self {
        self.visual = visual;
        self
    }

    /// Adds a body with one sphere geom of the given radius and color.
    /// Returns the builder; the body index is its insertion order.
    #[must_use]
    pub fn body(mut self, name: impl Into<String>, position: [f64; 3], radius: f64, rgba: [f32; 4]) -> Self {
        let name = name.into();
        let body = self.bodies.len();
        self.geoms.push(GeomSpec {
            name: format!("{name}_geom"),
            body: Some(body),
            offset: [0.0; 3],
            radius,
            rgba,
        });
        self.bodies.push(BodySpec {
            name,
            mass: 1.0,
            initial_position: position,
            initial_velocity: [0.0; 3],
        });
        self
    }

    /// Adds a fully specified body without geometry.
    #[must_use]
    pub fn body_spec(mut self, body: BodySpec) -> Self {
        self.bodies.push(body);
        self
    }

    /// Adds a geom.
    #[must_use]
    pub fn geom(mut self, geom: GeomSpec) -> Self {
        self.geoms.push(geom);
        self
    }

    /// Adds a static world sphere.
    #[must_use]
    pub fn static_geom(mut self, name: impl Into<String>, position: [f64; 3], radius: f64, rgba: [f32; 4]) -> Self {
        self.geoms.push(GeomSpec {
            name: name.into(),
            body: None,
            offset: position,
            radius,
            rgba,
        });
        self
    }

    /// Adds an actuator pushing `body` along `axis`.
    #[must_use]
    pub fn actuator(mut self, name: impl Into<String>, body: usize, axis: [f64; 3], gear: f64) -> Self {
        self.actuators.push(ActuatorSpec {
            name: name.into(),
            body,
            axis,
            gear,
            ctrl_range: None,
        });
        self
    }

    /// Adds a fully specified actuator.
    #[must_use]
    pub fn actuator_spec(mut self, actuator: ActuatorSpec) -> Self {
        self.actuators.push(actuator);
        self
    }

    /// Adds a sensor.
    #[must_use]
    pub fn sensor(mut self, name: impl Into<String>, kind: SensorKind) -> Self {
        self.sensors.push(SensorSpec { name: name.into(), kind });
        self
    }

    /// Adds a fixed camera.
    #[must_use]
    pub fn camera(mut self, name: impl Into<String>, position: [f64; 3], target: [f64; 3], fovy: f64) -> Self {
        self.cameras.push(CameraDef {
            name: name.into(),
            position,
            target,
            fovy,
        });
        self
    }

    /// Validates the topology and freezes it into a model.
    pub fn build(self) -> ModelResult<SimulationModel> {
        if !(self.timestep.is_finite() && self.timestep > 0.0) {
            return Err(ModelError::InvalidTimestep(self.timestep));
        }
        if self.name.is_empty() {
            return Err(ModelError::EmptyName("model"));
        }

        let body_count = self.bodies.len();
        let check_body = |owner: &'static str, name: &str, body: usize| {
            if body < body_count {
                Ok(())
            } else {
                Err(ModelError::UnknownBody {
                    owner,
                    name: name.to_owned(),
                    body,
                    body_count,
                })
            }
        };

        check_unique("body", self.bodies.iter().map(|b| b.name.as_str()))?;
        check_unique("actuator", self.actuators.iter().map(|a| a.name.as_str()))?;
        check_unique("sensor", self.sensors.iter().map(|s| s.name.as_str()))?;
        check_unique("camera", self.cameras.iter().map(|c| c.name.as_str()))?;

        for body in &self.bodies {
            if !(body.mass.is_finite() && body.mass > 0.0) {
                return Err(ModelError::InvalidValue { field: "body.mass", value: body.mass });
            }
        }
        for geom in &self.geoms {
            if let Some(body) = geom.body {
                check_body("geom", &geom.name, body)?;
            }
            if !(geom.radius.is_finite() && geom.radius > 0.0) {
                return Err(ModelError::InvalidValue { field: "geom.radius", value: geom.radius });
            }
        }
        let mut actuators = self.actuators;
        for actuator in &mut actuators {
            check_body("actuator", &actuator.name, actuator.body)?;
            let norm = dot(actuator.axis, actuator.axis).sqrt();
            if norm <= f64::EPSILON {
                return Err(ModelError::InvalidValue { field: "actuator.axis", value: norm });
            }
            actuator.axis = actuator.axis.map(|c| c / norm);
            if let Some((lo, hi)) = actuator.ctrl_range {
                let bad = [lo, hi].into_iter().find(|v| !v.is_finite());
                if let Some(value) = bad {
                    return Err(ModelError::InvalidValue { field: "actuator.ctrl_range", value });
                }
                // Inverted ranges would panic in `f64::clamp`.
                if lo > hi {
                    return Err(ModelError::InvalidValue { field: "actuator.ctrl_range", value: lo });
                }
            }
        }
        for sensor in &self.sensors {
            match sensor.kind {
                SensorKind::BodyPosition(body) | SensorKind::BodyVelocity(body) => {
                    check_body("sensor", &sensor.name, body)?;
                }
                SensorKind::ActuatorForce(actuator) if actuator >= actuators.len() => {
                    return Err(ModelError::UnknownActuator {
                        name: sensor.name.clone(),
                        actuator,
                        actuator_count: actuators.len(),
                    });
                }
                SensorKind::ActuatorForce(_) | SensorKind::Clock => {}
            }
        }
        for camera in &self.cameras {
            if !(camera.fovy > 0.0 && camera.fovy < 180.0) {
                return Err(ModelError::InvalidValue { field: "camera.fovy", value: camera.fovy });
            }
        }

        let mut sensor_addrs = Vec::with_capacity(self.sensors.len());
        let mut sensor_scalars = 0;
        for sensor in &self.sensors {
            sensor_addrs.push(sensor_scalars);
            sensor_scalars += sensor.kind.dim();
        }

        let stats = compute_stats(&self.bodies, &self.geoms);

        Ok(SimulationModel {
            name: self.name,
            timestep: self.timestep,
            gravity: self.gravity,
            bodies: self.bodies,
            geoms: self.geoms,
            actuators,
            sensors: self.sensors,
            cameras: self.cameras,
            visual: self.visual,
            stats,
            sensor_addrs,
            sensor_scalars,
        })
    }
}

fn check_unique<'a>(kind: &'static str, names: impl Iterator<Item = &'a str>) -> ModelResult<()> {
    let mut seen = std::collections::HashSet::new();
    for name in names {
        if name.is_empty() {
            return Err(ModelError::EmptyName(kind));
        }
        if !seen.insert(name) {
            return Err(ModelError::DuplicateName {
                kind,
                name: name.to_owned(),
            });
        }
    }
    Ok(())
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Bounding box of all geometry at time zero. The extent is the box
/// diagonal, never below 1 so an empty model still gets a usable camera.
fn compute_stats(bodies: &[BodySpec], geoms: &[GeomSpec]) -> ModelStats {
    let mut min = [f64::INFINITY; 3];
    let mut max = [f64::NEG_INFINITY; 3];
    for geom in geoms {
        let origin = geom.body.map_or([0.0; 3], |b| bodies[b].initial_position);
        for axis in 0..3 {
            let c = origin[axis] + geom.offset[axis];
            min[axis] = min[axis].min(c - geom.radius);
            max[axis] = max[axis].max(c + geom.radius);
        }
    }
    if geoms.is_empty() {
        return ModelStats {
            center: [0.0; 3],
            extent: 1.0,
        };
    }
    let center = [
        0.5 * (min[0] + max[0]),
        0.5 * (min[1] + max[1]),
        0.5 * (min[2] + max[2]),
    ];
    let diag = [max[0] - min[0], max[1] - min[1], max[2] - min[2]];
    ModelStats {
        center,
        extent: dot(diag, diag).sqrt().max(1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: [f32; 4] = [1.0, 0.0, 0.0, 1.0];

    fn pendulum() -> SimulationModel {
        SimulationModel::builder("pendulum")
            .static_geom("floor", [0.0, 0.0, 0.0], 0.5, [0.5; 4])
            .body("bob", [0.0, 0.0, 1.0], 0.1, RED)
            .actuator("push", 0, [0.0, 0.0, 2.0], 1.0)
            .sensor("bob_pos", SensorKind::BodyPosition(0))
            .sensor("push_force", SensorKind::ActuatorForce(0))
            .sensor("clock", SensorKind::Clock)
            .camera("overhead", [0.0, -3.0, 1.0], [0.0, 0.0, 0.5], 45.0)
            .build()
            .unwrap()
    }

    #[test]
    fn test_sensor_addresses_are_prefix_sums() {
        let model = pendulum();
        assert_eq!(model.sensor_addr(0), Some(0));
        assert_eq!(model.sensor_addr(1), Some(3));
        assert_eq!(model.sensor_addr(2), Some(4));
        assert_eq!(model.sensor_addr(3), None);
        assert_eq!(model.sensor_scalars(), 5);
    }

    #[test]
    fn test_geom_categories() {
        let model = pendulum();
        assert_eq!(model.static_geom_count(), 1);
        assert_eq!(model.dynamic_geom_count(), 1);
    }

    #[test]
    fn test_actuator_axis_normalized() {
        let model = pendulum();
        assert_eq!(model.actuators()[0].axis, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_rejects_bad_timestep() {
        let err = SimulationModel::builder("m").timestep(0.0).build().unwrap_err();
        assert_eq!(err, ModelError::InvalidTimestep(0.0));
    }

    #[test]
    fn test_rejects_dangling_body() {
        let err = SimulationModel::builder("m")
            .actuator("a", 2, [1.0, 0.0, 0.0], 1.0)
            .build()
            .unwrap_err();
        assert!(matches!(err, ModelError::UnknownBody { body: 2, body_count: 0, .. }));
    }

    #[test]
    fn test_rejects_duplicate_camera() {
        let err = SimulationModel::builder("m")
            .camera("c", [0.0; 3], [1.0, 0.0, 0.0], 45.0)
            .camera("c", [0.0; 3], [1.0, 0.0, 0.0], 45.0)
            .build()
            .unwrap_err();
        assert!(matches!(err, ModelError::DuplicateName { kind: "camera", .. }));
    }

    fn ranged(ctrl_range: Option<(f64, f64)>) -> ModelResult<SimulationModel> {
        SimulationModel::builder("m")
            .body("b", [0.0; 3], 0.1, RED)
            .actuator_spec(ActuatorSpec {
                name: "a".into(),
                body: 0,
                axis: [1.0, 0.0, 0.0],
                gear: 1.0,
                ctrl_range,
            })
            .build()
    }

    #[test]
    fn test_ctrl_range_validation() {
        assert!(ranged(None).is_ok());
        assert!(ranged(Some((-1.0, 1.0))).is_ok());
        assert!(ranged(Some((0.5, 0.5))).is_ok());

        let err = ranged(Some((1.0, -1.0))).unwrap_err();
        assert_eq!(err, ModelError::InvalidValue { field: "actuator.ctrl_range", value: 1.0 });
        let err = ranged(Some((-1.0, f64::INFINITY))).unwrap_err();
        assert_eq!(
            err,
            ModelError::InvalidValue { field: "actuator.ctrl_range", value: f64::INFINITY }
        );
        assert!(matches!(
            ranged(Some((f64::NAN, 1.0))),
            Err(ModelError::InvalidValue { field: "actuator.ctrl_range", .. })
        ));
    }

    #[test]
    fn test_depth_range_scales_with_extent() {
        let model = pendulum();
        let (near, far) = model.depth_range();
        let extent = model.stats().extent;
        assert!((near - 0.01 * extent).abs() < 1e-12);
        assert!((far - 50.0 * extent).abs() < 1e-12);
    }

    #[test]
    fn test_linearize_depth_endpoints() {
        assert!((linearize_depth(0.0, 0.1, 10.0) - 0.1).abs() < 1e-9);
        assert!((linearize_depth(1.0, 0.1, 10.0) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_model_has_unit_extent() {
        let model = SimulationModel::builder("empty").build().unwrap();
        assert_eq!(model.stats().extent, 1.0);
    }
}
