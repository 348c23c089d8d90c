//! Shared fixtures for the runtime integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use simview_core::{ClientSettings, RenderMode, Resolution, SensorKind, SimulationModel};
use simview_render::{SoftwareBackend, SoftwareConfig};

/// One falling ball over a static floor, watched by `cameras` cameras.
pub fn ball_model(name: &str, cameras: usize) -> Arc<SimulationModel> {
    let mut builder = SimulationModel::builder(name)
        .timestep(0.002)
        .body("ball", [0.0, 0.0, 1.0], 0.1, [0.9, 0.3, 0.2, 1.0])
        .static_geom("floor", [0.6, 0.0, -1.0], 1.0, [0.4, 0.4, 0.4, 1.0])
        .actuator("lift", 0, [0.0, 0.0, 1.0], 5.0)
        .sensor("ball_pos", SensorKind::BodyPosition(0))
        .sensor("clock", SensorKind::Clock);
    for index in 0..cameras {
        let angle = index as f64;
        builder = builder.camera(
            format!("cam{index}"),
            [3.0 * angle.cos(), 3.0 * angle.sin(), 1.0],
            [0.0, 0.0, 0.5],
            45.0,
        );
    }
    Arc::new(builder.build().unwrap())
}

/// Software backend handing out small offscreen buffers.
pub fn small_backend() -> SoftwareBackend {
    SoftwareBackend::with_config(SoftwareConfig {
        max_offscreen: Resolution::new(32, 24),
        ..SoftwareConfig::default()
    })
}

/// Settings for `mode` with a fast window frame rate.
pub fn settings(mode: RenderMode) -> ClientSettings {
    ClientSettings {
        render_mode: mode,
        visual_fps: 200.0,
        ..ClientSettings::default()
    }
}

/// Polls `condition` until it holds or five seconds pass.
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}
