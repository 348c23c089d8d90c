//! Configuration for the render context and for each simulation client.
//!
//! ```toml
//! [context]
//! window_width = 1024
//! window_height = 768
//! window_title = "Rig"
//!
//! [client]
//! render_mode = "global"
//! visual_fps = 30.0
//! camera_interval = 0.02
//! ```
//!
//! Every field has a default, so an empty document is a valid config.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::sync::CameraSchedule;

/// How a simulation client is drawn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// A window of its own.
    Local,
    /// Overlaid into the one window shared by every global client.
    Global,
    /// No window. Offscreen cameras still work.
    #[default]
    None,
}

/// Per-client settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Window binding strategy.
    pub render_mode: RenderMode,
    /// Sync buffer swaps to the display.
    pub vsync: bool,
    /// Window frame rate. Windows paint at most this often regardless of vsync.
    pub visual_fps: f64,
    /// Simulation seconds between camera frames.
    pub camera_interval: f64,
    /// Initial free-camera zoom; distance is model extent divided by this.
    pub zoom_level: f64,
    /// Create offscreen surfaces for the model's cameras.
    pub cameras: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            render_mode: RenderMode::None,
            vsync: true,
            visual_fps: 60.0,
            camera_interval: CameraSchedule::DEFAULT_INTERVAL,
            zoom_level: 1.0,
            cameras: true,
        }
    }
}

impl ClientSettings {
    /// Wall-clock time between window paints.
    #[must_use]
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.visual_fps)
    }

    /// Camera schedule for these settings.
    #[must_use]
    pub const fn camera_schedule(&self) -> CameraSchedule {
        CameraSchedule::new(self.camera_interval)
    }

    /// Rejects non-positive rates and intervals.
    pub fn validate(&self) -> ConfigResult<()> {
        positive("client.visual_fps", self.visual_fps)?;
        positive("client.camera_interval", self.camera_interval)?;
        positive("client.zoom_level", self.zoom_level)?;
        Ok(())
    }
}

/// Settings shared by the whole render context.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Window width in pixels.
    pub window_width: u32,
    /// Window height in pixels.
    pub window_height: u32,
    /// Window title.
    pub window_title: String,
    /// Maximum geoms in one composed scene.
    pub scene_capacity: usize,
    /// How long the coordinator parks when there is nothing to do.
    pub idle_park_ms: u64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            window_width: 800,
            window_height: 800,
            window_title: "Simulation".to_owned(),
            scene_capacity: 2000,
            idle_park_ms: 1,
        }
    }
}

impl ContextConfig {
    /// Coordinator idle park duration.
    #[must_use]
    pub const fn idle_park(&self) -> Duration {
        Duration::from_millis(self.idle_park_ms)
    }

    /// Rejects empty windows and scenes.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.window_width == 0 {
            return Err(invalid("context.window_width", self.window_width));
        }
        if self.window_height == 0 {
            return Err(invalid("context.window_height", self.window_height));
        }
        if self.scene_capacity == 0 {
            return Err(invalid("context.scene_capacity", self.scene_capacity));
        }
        Ok(())
    }
}

/// Full configuration document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimviewConfig {
    /// Render context settings.
    pub context: ContextConfig,
    /// Default client settings.
    pub client: ClientSettings,
}

impl SimviewConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Validates both sections.
    pub fn validate(&self) -> ConfigResult<()> {
        self.context.validate()?;
        self.client.validate()
    }
}

fn positive(field: &'static str, value: f64) -> ConfigResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, value))
    }
}

fn invalid(field: &'static str, value: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        field,
        value: value.to_string(),
    }
}
