//! Logical key events handed to the UI layer.

/// A key identity after HID usage translation.
///
/// Printable keys arrive as `Char` with shift already applied; control
/// and navigation keys keep their name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Key {
    Char(char),
    Enter,
    Escape,
    Backspace,
    Tab,
    Home,
    End,
    PageUp,
    PageDown,
    Delete,
    Right,
    Left,
    Down,
    Up,
}

/// One key transition, timestamped when the notification was decoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyEvent {
    pub key: Key,
    /// `true` on press, `false` on release.
    pub pressed: bool,
    /// Milliseconds since boot, wrapping.
    pub timestamp_ms: u32,
}

impl KeyEvent {
    pub const fn press(key: Key, timestamp_ms: u32) -> Self {
        Self { key, pressed: true, timestamp_ms }
    }

    pub const fn release(key: Key, timestamp_ms: u32) -> Self {
        Self { key, pressed: false, timestamp_ms }
    }
}
