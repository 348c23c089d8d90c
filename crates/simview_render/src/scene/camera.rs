//! # Cameras
//!
//! Two kinds of camera feed the renderer:
//!
//! - Fixed model cameras, used by offscreen surfaces. Their pose comes
//!   straight from the model.
//! - The free [`ViewCamera`] of a window, orbiting a look-at point and moved
//!   by pointer drags and scrolls.
//!
//! Both reduce to a [`CameraPose`] before drawing.

use simview_core::{CameraDef, ModelStats};

/// Fovy of window cameras, in degrees.
pub const FREE_CAMERA_FOVY: f64 = 45.0;

/// Closest a free camera may get to its look-at point.
const MIN_DISTANCE: f64 = 1e-3;

/// Elevation limit in degrees, keeping the view off the poles.
const MAX_ELEVATION: f64 = 89.0;

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn normalize(v: [f64; 3]) -> Option<[f64; 3]> {
    let len = dot(v, v).sqrt();
    (len > f64::EPSILON).then(|| [v[0] / len, v[1] / len, v[2] / len])
}

fn axpy(a: f64, x: [f64; 3], y: [f64; 3]) -> [f64; 3] {
    [a * x[0] + y[0], a * x[1] + y[1], a * x[2] + y[2]]
}

/// Everything the rasterizer needs to know about the eye.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraPose {
    /// Eye position.
    pub eye: [f64; 3],
    /// Unit view direction.
    pub forward: [f64; 3],
    /// Unit right vector.
    pub right: [f64; 3],
    /// Unit up vector, orthogonal to forward and right.
    pub up: [f64; 3],
    /// Vertical field of view in degrees.
    pub fovy: f64,
    /// Near clip distance.
    pub near: f64,
    /// Far clip distance.
    pub far: f64,
}

impl CameraPose {
    /// Builds a pose looking from `eye` at `target` with `+z` as world up.
    ///
    /// Falls back to `+y` as up when looking straight along `z`, and to
    /// looking down `-z` when eye and target coincide.
    #[must_use]
    pub fn look_at(eye: [f64; 3], target: [f64; 3], fovy: f64, near: f64, far: f64) -> Self {
        let forward = normalize([target[0] - eye[0], target[1] - eye[1], target[2] - eye[2]])
            .unwrap_or([0.0, 0.0, -1.0]);
        let right = normalize(cross(forward, [0.0, 0.0, 1.0]))
            .or_else(|| normalize(cross(forward, [0.0, 1.0, 0.0])))
            .unwrap_or([1.0, 0.0, 0.0]);
        let up = cross(right, forward);
        Self {
            eye,
            forward,
            right,
            up,
            fovy,
            near,
            far,
        }
    }

    /// Pose of a fixed model camera.
    #[must_use]
    pub fn from_camera(camera: &CameraDef, near: f64, far: f64) -> Self {
        Self::look_at(camera.position, camera.target, camera.fovy, near, far)
    }

    /// Camera-space coordinates `(x right, y up, z forward)` of a world point.
    #[must_use]
    pub fn to_camera_space(&self, point: [f64; 3]) -> [f64; 3] {
        let rel = [point[0] - self.eye[0], point[1] - self.eye[1], point[2] - self.eye[2]];
        [dot(rel, self.right), dot(rel, self.up), dot(rel, self.forward)]
    }
}

/// Ways a pointer gesture can move a free camera.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MouseAction {
    /// Orbit around the look-at point, horizontal emphasis.
    RotateH,
    /// Orbit around the look-at point, vertical emphasis.
    RotateV,
    /// Pan the look-at point in the horizontal plane.
    MoveH,
    /// Pan the look-at point in the view plane.
    MoveV,
    /// Change orbit distance.
    Zoom,
}

/// Orbiting window camera.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewCamera {
    /// Point the camera orbits.
    pub lookat: [f64; 3],
    /// Distance from the look-at point.
    pub distance: f64,
    /// Azimuth in degrees.
    pub azimuth: f64,
    /// Elevation in degrees, negative looks down.
    pub elevation: f64,
    /// Model extent, used to scale zoom steps.
    extent: f64,
}

impl ViewCamera {
    /// Frames a model: looks at its center from `extent / zoom` away.
    #[must_use]
    pub fn for_model(stats: ModelStats, zoom: f64) -> Self {
        let zoom = if zoom > 0.0 { zoom } else { 1.0 };
        Self {
            lookat: stats.center,
            distance: (stats.extent / zoom).max(MIN_DISTANCE),
            azimuth: 90.0,
            elevation: -45.0,
            extent: stats.extent,
        }
    }

    fn forward(&self) -> [f64; 3] {
        let (az, el) = (self.azimuth.to_radians(), self.elevation.to_radians());
        [el.cos() * az.cos(), el.cos() * az.sin(), el.sin()]
    }

    /// Current eye pose.
    #[must_use]
    pub fn pose(&self, near: f64, far: f64) -> CameraPose {
        let eye = axpy(-self.distance, self.forward(), self.lookat);
        CameraPose::look_at(eye, self.lookat, FREE_CAMERA_FOVY, near, far)
    }

    /// Applies a gesture. `reldx`/`reldy` are pointer deltas divided by the
    /// window height.
    pub fn move_camera(&mut self, action: MouseAction, reldx: f64, reldy: f64) {
        match action {
            MouseAction::RotateH | MouseAction::RotateV => {
                self.azimuth -= reldx * 180.0;
                if action == MouseAction::RotateV {
                    self.elevation = (self.elevation - reldy * 180.0).clamp(-MAX_ELEVATION, MAX_ELEVATION);
                }
            }
            MouseAction::MoveH | MouseAction::MoveV => {
                let pose = self.pose(MIN_DISTANCE, 1.0);
                let scale = self.distance;
                let second = if action == MouseAction::MoveH {
                    normalize([pose.forward[0], pose.forward[1], 0.0]).unwrap_or(pose.up)
                } else {
                    pose.up
                };
                self.lookat = axpy(-reldx * scale, pose.right, self.lookat);
                self.lookat = axpy(reldy * scale, second, self.lookat);
            }
            MouseAction::Zoom => {
                let step = (1.0 + self.distance / self.extent / 3.0).ln() * reldy * 9.0 * self.extent;
                self.distance = (self.distance - step).max(MIN_DISTANCE);
            }
        }
    }
}
