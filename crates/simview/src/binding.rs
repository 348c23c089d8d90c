//! Render-mode binding strategies.
//!
//! A client's [`RenderMode`] is resolved once, at registration, into the
//! way its instance is attached to window surfaces.

use simview_core::RenderMode;

/// How an instance is attached to windows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BindingStrategy {
    /// A new window whose only binding is this instance.
    DedicatedWindow,
    /// The process-wide shared window. The first instance bound there is
    /// primary, later ones contribute dynamic geometry only.
    SharedWindow,
    /// No window.
    Headless,
}

impl BindingStrategy {
    /// Returns `true` if the strategy puts the instance in a window.
    #[must_use]
    pub const fn needs_window(self) -> bool {
        !matches!(self, Self::Headless)
    }

    /// Window title for an instance of `model_name`.
    #[must_use]
    pub fn window_title(self, base: &str, model_name: &str) -> String {
        match self {
            Self::DedicatedWindow => format!("{base} - {model_name}"),
            Self::SharedWindow | Self::Headless => base.to_owned(),
        }
    }
}

impl From<RenderMode> for BindingStrategy {
    fn from(mode: RenderMode) -> Self {
        match mode {
            RenderMode::Local => Self::DedicatedWindow,
            RenderMode::Global => Self::SharedWindow,
            RenderMode::None => Self::Headless,
        }
    }
}
