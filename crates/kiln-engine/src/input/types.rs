use crate::coords::{SurfaceSize, Vec2};

/// Keyboard key.
///
/// Hosts map platform key codes onto these; anything else is
/// `Key::Unknown` with a stable platform code.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Key {
    Escape,
    Enter,
    Tab,
    Backspace,
    Space,
    Delete,

    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,

    Shift,
    Control,
    Alt,

    A, B, C, D, E, F, G, H, I, J, K, L, M,
    N, O, P, Q, R, S, T, U, V, W, X, Y, Z,

    Digit0, Digit1, Digit2, Digit3, Digit4,
    Digit5, Digit6, Digit7, Digit8, Digit9,

    Unknown(u32),
}

/// Pressed / released, shared by keys and buttons.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ButtonState {
    Pressed,
    Released,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other(u16),
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub fn any(&self) -> bool {
        self.shift || self.ctrl || self.alt || self.meta
    }
}

/// Scroll amount.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum WheelDelta {
    /// Notched wheels; one unit per notch.
    Lines(Vec2),
    /// Touchpads and other high-resolution devices.
    Pixels(Vec2),
}

/// Host-agnostic input event. Positions are surface pixels, top-left origin.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Key {
        key: Key,
        state: ButtonState,
        modifiers: Modifiers,
        repeat: bool,
    },
    PointerMoved {
        position: Vec2,
    },
    PointerButton {
        button: MouseButton,
        state: ButtonState,
        position: Vec2,
        modifiers: Modifiers,
    },
    Wheel {
        delta: WheelDelta,
        modifiers: Modifiers,
    },
    /// Committed text.
    Text(String),
    PointerLeft,
    Focused(bool),
    Resized(SurfaceSize),
}
