//! HID boot-keyboard report handling.
//!
//! `keyboard` holds the raw 8-byte report type, `keymap` the usage →
//! logical-key table, and `decoder` the differential decode that turns
//! consecutive reports into press/release events.

pub mod decoder;
pub mod keyboard;
pub mod keymap;
