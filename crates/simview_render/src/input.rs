//! Pointer input for window surfaces.
//!
//! Each window tracks its own button and cursor state. Drags are turned into
//! camera moves scaled by the window height, so a drag across the full
//! height is one unit.

use crate::backend::ContextId;
use crate::scene::MouseAction;

/// Pointer button.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MouseButton {
    /// Primary button.
    Left,
    /// Secondary button.
    Right,
    /// Wheel button.
    Middle,
}

/// Raw input delivered to a window.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputEvent {
    /// A button changed state.
    Button {
        /// Which button.
        button: MouseButton,
        /// `true` on press.
        pressed: bool,
    },
    /// The cursor moved to window coordinates `(x, y)`.
    CursorMoved {
        /// Horizontal position in pixels.
        x: f64,
        /// Vertical position in pixels, growing downwards.
        y: f64,
        /// Shift held during the move.
        shift: bool,
    },
    /// Wheel scrolled.
    Scroll {
        /// Vertical scroll offset.
        y_offset: f64,
    },
}

/// An input event tagged with the window it belongs to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WindowEvent {
    /// Target window.
    pub context: ContextId,
    /// The event.
    pub event: InputEvent,
}

/// Per-window pointer state.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PointerState {
    left: bool,
    right: bool,
    middle: bool,
    last: Option<(f64, f64)>,
}

impl PointerState {
    /// Scroll offset to zoom factor.
    pub const SCROLL_SCALE: f64 = -0.05;

    /// Feeds one event. Returns the camera move it causes, if any, as
    /// `(action, reldx, reldy)`.
    pub fn apply(&mut self, event: InputEvent, window_height: u32) -> Option<(MouseAction, f64, f64)> {
        match event {
            InputEvent::Button { button, pressed } => {
                match button {
                    MouseButton::Left => self.left = pressed,
                    MouseButton::Right => self.right = pressed,
                    MouseButton::Middle => self.middle = pressed,
                }
                None
            }
            InputEvent::Scroll { y_offset } => Some((MouseAction::Zoom, 0.0, Self::SCROLL_SCALE * y_offset)),
            InputEvent::CursorMoved { x, y, shift } => {
                let last = self.last.replace((x, y));
                if !(self.left || self.right || self.middle) {
                    return None;
                }
                let (lx, ly) = last?;
                let height = f64::from(window_height.max(1));
                let (dx, dy) = ((x - lx) / height, (y - ly) / height);

                let action = if self.right {
                    if shift {
                        MouseAction::MoveH
                    } else {
                        MouseAction::MoveV
                    }
                } else if self.left {
                    if shift {
                        MouseAction::RotateH
                    } else {
                        MouseAction::RotateV
                    }
                } else {
                    MouseAction::Zoom
                };
                Some((action, dx, dy))
            }
        }
    }

    /// Returns `true` while any button is held.
    #[must_use]
    pub const fn dragging(&self) -> bool {
        self.left || self.right || self.middle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moved(x: f64, y: f64, shift: bool) -> InputEvent {
        InputEvent::CursorMoved { x, y, shift }
    }

    #[test]
    fn test_move_without_button_is_ignored() {
        let mut pointer = PointerState::default();
        assert_eq!(pointer.apply(moved(10.0, 10.0, false), 100), None);
        assert_eq!(pointer.apply(moved(20.0, 10.0, false), 100), None);
    }

    #[test]
    fn test_left_drag_rotates() {
        let mut pointer = PointerState::default();
        pointer.apply(moved(10.0, 10.0, false), 100);
        pointer.apply(InputEvent::Button { button: MouseButton::Left, pressed: true }, 100);
        assert!(pointer.dragging());

        let step = pointer.apply(moved(30.0, 60.0, false), 100);
        assert_eq!(step, Some((MouseAction::RotateV, 0.2, 0.5)));

        let step = pointer.apply(moved(40.0, 60.0, true), 100);
        assert_eq!(step, Some((MouseAction::RotateH, 0.1, 0.0)));
    }

    #[test]
    fn test_right_drag_pans() {
        let mut pointer = PointerState::default();
        pointer.apply(moved(0.0, 0.0, false), 200);
        pointer.apply(InputEvent::Button { button: MouseButton::Right, pressed: true }, 200);
        let step = pointer.apply(moved(0.0, 20.0, true), 200);
        assert_eq!(step, Some((MouseAction::MoveH, 0.0, 0.1)));
    }

    #[test]
    fn test_release_stops_drag() {
        let mut pointer = PointerState::default();
        pointer.apply(InputEvent::Button { button: MouseButton::Left, pressed: true }, 100);
        pointer.apply(InputEvent::Button { button: MouseButton::Left, pressed: false }, 100);
        assert!(!pointer.dragging());
        assert_eq!(pointer.apply(moved(5.0, 5.0, false), 100), None);
    }

    #[test]
    fn test_scroll_zooms() {
        let mut pointer = PointerState::default();
        let step = pointer.apply(InputEvent::Scroll { y_offset: 2.0 }, 100);
        assert_eq!(step, Some((MouseAction::Zoom, 0.0, -0.1)));
    }
}
