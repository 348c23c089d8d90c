//! # Interface Descriptors
//!
//! Flat views of what a model exposes to the outside: the control vector,
//! the sensor vector and the camera images.
//!
//! ```text
//! sensor data:  [ pos.x pos.y pos.z | force | clock ]
//!                 addr 0              addr 3  addr 4
//!
//! camera rgb:   [ cam0: 3*w0*h0 bytes | cam1: 3*w1*h1 bytes | ... ]
//! camera depth: [ cam0:   w0*h0 f32   | cam1:   w1*h1 f32   | ... ]
//! ```
//!
//! Each descriptor hashes the fields that decide its layout. Two models with
//! the same layout get the same [`layout_key`](ControlInterface::layout_key),
//! so a host can reuse per-layout output descriptors.

use std::hash::Hasher;

use siphasher::sip::SipHasher13;

use super::{Resolution, SimulationModel};

/// Fixed SipHash keys. Changing them changes every layout key.
const LAYOUT_KEY0: u64 = 0x7369_6d76_6965_7721;
const LAYOUT_KEY1: u64 = 0x6c61_796f_7574_2d31;

fn layout_hasher(kind: &str) -> SipHasher13 {
    let mut hasher = SipHasher13::new_with_keys(LAYOUT_KEY0, LAYOUT_KEY1);
    hasher.write(kind.as_bytes());
    hasher
}

fn write_names(hasher: &mut SipHasher13, names: &[String]) {
    for name in names {
        hasher.write(name.as_bytes());
        hasher.write_u8(0);
    }
}

fn key(kind: &str, hash: u64) -> String {
    format!("simview_{kind}_{hash:016x}")
}

/// Control vector layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControlInterface {
    /// Number of control scalars.
    pub count: usize,
    /// Actuator names, in control order.
    pub names: Vec<String>,
}

impl ControlInterface {
    /// Derives the control layout of `model`.
    #[must_use]
    pub fn from_model(model: &SimulationModel) -> Self {
        let names: Vec<String> = model.actuators().iter().map(|a| a.name.clone()).collect();
        Self {
            count: names.len(),
            names,
        }
    }

    /// Stable hash over the layout.
    #[must_use]
    pub fn layout_hash(&self) -> u64 {
        let mut hasher = layout_hasher("control");
        hasher.write_usize(self.count);
        write_names(&mut hasher, &self.names);
        hasher.finish()
    }

    /// Layout key, `simview_control_<hash>`.
    #[must_use]
    pub fn layout_key(&self) -> String {
        key("control", self.layout_hash())
    }
}

/// Sensor vector layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SensorInterface {
    /// Number of sensors.
    pub count: usize,
    /// Total number of scalars over all sensors.
    pub scalar_count: usize,
    /// Sensor names.
    pub names: Vec<String>,
    /// Scalars per sensor.
    pub dims: Vec<usize>,
    /// Offset of each sensor in the flat sensor vector.
    pub addrs: Vec<usize>,
}

impl SensorInterface {
    /// Derives the sensor layout of `model`.
    #[must_use]
    pub fn from_model(model: &SimulationModel) -> Self {
        let sensors = model.sensors();
        let names = sensors.iter().map(|s| s.name.clone()).collect();
        let dims: Vec<usize> = sensors.iter().map(|s| s.kind.dim()).collect();
        let addrs = (0..sensors.len())
            .filter_map(|i| model.sensor_addr(i))
            .collect();
        Self {
            count: sensors.len(),
            scalar_count: model.sensor_scalars(),
            names,
            dims,
            addrs,
        }
    }

    /// Stable hash over the layout.
    #[must_use]
    pub fn layout_hash(&self) -> u64 {
        let mut hasher = layout_hasher("sensor");
        hasher.write_usize(self.count);
        hasher.write_usize(self.scalar_count);
        write_names(&mut hasher, &self.names);
        for dim in &self.dims {
            hasher.write_usize(*dim);
        }
        hasher.finish()
    }

    /// Layout key, `simview_sensor_<hash>`.
    #[must_use]
    pub fn layout_key(&self) -> String {
        key("sensor", self.layout_hash())
    }
}

/// Camera image layout.
///
/// Sizes are the viewports actually granted by the graphics layer, which
/// may be smaller than the model asked for.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CameraInterface {
    /// Number of cameras.
    pub count: usize,
    /// Camera names, in camera-id order.
    pub names: Vec<String>,
    /// Granted resolution per camera.
    pub sizes: Vec<Resolution>,
    /// Byte offset of each camera in the concatenated RGB output.
    pub rgb_addrs: Vec<usize>,
    /// Element offset of each camera in the concatenated depth output.
    pub depth_addrs: Vec<usize>,
    /// Total RGB bytes.
    pub rgb_len: usize,
    /// Total depth values.
    pub depth_len: usize,
}

impl CameraInterface {
    /// Builds a layout from camera names and granted sizes.
    #[must_use]
    pub fn new(names: Vec<String>, sizes: Vec<Resolution>) -> Self {
        let mut rgb_addrs = Vec::with_capacity(sizes.len());
        let mut depth_addrs = Vec::with_capacity(sizes.len());
        let mut rgb_len = 0;
        let mut depth_len = 0;
        for size in &sizes {
            rgb_addrs.push(rgb_len);
            depth_addrs.push(depth_len);
            rgb_len += size.rgb_len();
            depth_len += size.pixels();
        }
        Self {
            count: sizes.len(),
            names,
            sizes,
            rgb_addrs,
            depth_addrs,
            rgb_len,
            depth_len,
        }
    }

    /// Layout the model requests, before any viewport has been measured.
    #[must_use]
    pub fn requested(model: &SimulationModel) -> Self {
        let names: Vec<String> = model.cameras().iter().map(|c| c.name.clone()).collect();
        let sizes = vec![model.visual().offscreen; names.len()];
        Self::new(names, sizes)
    }

    /// Stable hash over the layout.
    #[must_use]
    pub fn layout_hash(&self) -> u64 {
        let mut hasher = layout_hasher("camera");
        hasher.write_usize(self.count);
        write_names(&mut hasher, &self.names);
        for size in &self.sizes {
            hasher.write_u32(size.width);
            hasher.write_u32(size.height);
        }
        hasher.finish()
    }

    /// Layout key, `simview_camera_<hash>`.
    #[must_use]
    pub fn layout_key(&self) -> String {
        key("camera", self.layout_hash())
    }
}

/// Summary sizes of every output a client exposes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InterfaceLayout {
    /// Length of the control vector.
    pub control_count: usize,
    /// Length of the flat sensor vector.
    pub sensor_scalars: usize,
    /// Total RGB bytes over all cameras.
    pub rgb_len: usize,
    /// Total depth values over all cameras.
    pub depth_len: usize,
}

impl InterfaceLayout {
    /// Combines the three descriptors.
    #[must_use]
    pub const fn new(controls: &ControlInterface, sensors: &SensorInterface, cameras: &CameraInterface) -> Self {
        Self {
            control_count: controls.count,
            sensor_scalars: sensors.scalar_count,
            rgb_len: cameras.rgb_len,
            depth_len: cameras.depth_len,
        }
    }
}
