//! Library interface for hogkbd.
//!
//! The decode/translate/queue/lifecycle core is pure `no_std` code and
//! compiles on the host, so `cargo test` exercises it without any
//! hardware. The radio-facing half (scanner, GATT client, host task,
//! flash-backed bond store) sits behind the `embedded` feature and only
//! builds for the nRF52840 target.
//!
//! Usage: `cargo test` on the host; `cargo build --features embedded`
//! builds the firmware binary in main.rs.

#![cfg_attr(not(test), no_std)]

pub mod ble;
pub mod config;
pub mod error;
pub mod hid;
pub mod input;
pub mod storage;

// ═══════════════════════════════════════════════════════════════════════
// Facade re-exports
// ═══════════════════════════════════════════════════════════════════════

pub use crate::ble::address::PeerAddress;
pub use crate::ble::filter::KeyboardFilter;
pub use crate::ble::lifecycle::{ConnectionState, Lifecycle, LinkEvent};
pub use crate::error::HostError;
pub use crate::hid::decoder::{DecodeStats, Decoded, ReportDecoder};
pub use crate::hid::keyboard::KeyboardReport;
pub use crate::input::event::{Key, KeyEvent};
pub use crate::input::{KeyInput, SharedEventQueue};
