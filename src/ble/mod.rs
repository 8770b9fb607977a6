//! Bluetooth Low Energy subsystem.
//!
//! Drives the Nordic SoftDevice S140 in **Central** role:
//!
//! 1. **Scanner** - runs the GAP scan until one advertisement passes the
//!    keyboard filter (bonded address, HID service UUID or keyboard
//!    appearance).
//! 2. **HID Client** - GATT discovery on the connected peripheral and
//!    subscription to Input Report notifications.
//! 3. **Host task** - owns the connection lifecycle, security, the
//!    report decoder and the reconnect policy.
//!
//! The acceptance policy, advertisement parsing and the link state
//! machine carry no SoftDevice types, so they build and test on the
//! host. Communication with the consumer side is done via Embassy
//! channels created in main.rs; nothing here is reachable through a
//! global.

pub mod address;
pub mod adv_parser;
pub mod filter;
pub mod lifecycle;

#[cfg(feature = "embedded")]
pub mod hid_client;
#[cfg(feature = "embedded")]
pub mod host;
#[cfg(feature = "embedded")]
pub mod scanner;

#[cfg(feature = "embedded")]
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
#[cfg(feature = "embedded")]
use embassy_sync::channel::{Receiver, Sender};
#[cfg(feature = "embedded")]
use nrf_softdevice::ble::Address;

use heapless::String;

use crate::ble::lifecycle::ConnectionState;
use crate::error::HostError;

/// A scan hit that passed the keyboard filter.
///
/// Advertisement memory is only valid inside the scan callback, so
/// everything the host needs later is copied out here.
#[cfg(feature = "embedded")]
#[derive(Clone, defmt::Format)]
pub struct KeyboardCandidate {
    /// BLE address, as reported on air.
    pub address: Address,
    /// Advertised name, `"Unknown"` when absent.
    pub name: String<32>,
    /// Received Signal Strength Indicator (dBm).
    pub rssi: i8,
}

/// Commands the consumer side sends to the host task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HostCommand {
    /// Begin, or resume after an error, the scan/connect cycle.
    Start,
    /// Drop the active connection and go idle until the next `Start`.
    Disconnect,
}

/// Status events the host task publishes.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HostEvent {
    /// The lifecycle moved to a new state.
    StateChanged(ConnectionState),
    /// Connected, secured and subscribed - keystrokes are flowing.
    /// Carries the peripheral's advertised name for display.
    Ready(String<32>),
    /// The link ended (peer gone or disconnect requested).
    Disconnected,
    /// The host gave up; it waits for a fresh `Start`.
    Fault(HostError),
}

/// Channel plumbing between main.rs and the host task.
#[cfg(feature = "embedded")]
pub type CommandRx = Receiver<'static, CriticalSectionRawMutex, HostCommand, 4>;
#[cfg(feature = "embedded")]
pub type EventTx = Sender<'static, CriticalSectionRawMutex, HostEvent, 8>;
#[cfg(feature = "embedded")]
pub type EventRx = Receiver<'static, CriticalSectionRawMutex, HostEvent, 8>;
