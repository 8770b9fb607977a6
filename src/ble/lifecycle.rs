//! Connection lifecycle policy.
//!
//! The async connection task drives the radio; everything that can be
//! decided without touching it lives here so it can be tested on the
//! host: the link state machine, connection-object reuse and the
//! per-characteristic subscription choice.

use heapless::Vec;

use crate::ble::address::PeerAddress;
use crate::config::{MAX_CONNECTIONS, MAX_REPORT_CHARS};
use crate::error::HostError;

/// Where the keyboard link currently stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionState {
    Idle,
    Scanning,
    Connecting,
    Securing,
    DiscoveringServices,
    Subscribing,
    Ready,
    Disconnected,
    Error,
}

/// Inputs that move the state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkEvent {
    StartRequested,
    KeyboardAccepted,
    LinkUp,
    EncryptionEstablished,
    HidServiceFound,
    SubscriptionsActive,
    LinkLost,
    Failed(HostError),
}

/// Link state machine.
///
/// The driving task feeds it `LinkEvent`s and publishes the resulting
/// state; everyone else only reads. Out-of-order events leave the state
/// unchanged rather than panicking, since a lost link can race any
/// stage.
pub struct Lifecycle {
    state: ConnectionState,
    last_error: Option<HostError>,
}

impl Lifecycle {
    pub const fn new() -> Self {
        Self { state: ConnectionState::Idle, last_error: None }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The error that put the machine into `Error`, if any.
    pub fn last_error(&self) -> Option<HostError> {
        self.last_error
    }

    /// Apply one event; returns the (possibly unchanged) new state.
    pub fn on_event(&mut self, event: LinkEvent) -> ConnectionState {
        use ConnectionState::*;

        self.state = match (self.state, event) {
            (_, LinkEvent::Failed(err)) => {
                self.last_error = Some(err);
                Error
            }
            // A lost link only matters once we hold one.
            (Connecting | Securing | DiscoveringServices | Subscribing | Ready, LinkEvent::LinkLost) => {
                Disconnected
            }
            (Idle | Disconnected | Error, LinkEvent::StartRequested) => {
                self.last_error = None;
                Scanning
            }
            (Scanning, LinkEvent::KeyboardAccepted) => Connecting,
            (Connecting, LinkEvent::LinkUp) => Securing,
            (Securing, LinkEvent::EncryptionEstablished) => DiscoveringServices,
            (DiscoveringServices, LinkEvent::HidServiceFound) => Subscribing,
            (Subscribing, LinkEvent::SubscriptionsActive) => Ready,
            (state, _) => state,
        };
        self.state
    }

    /// Re-arm scanning after a normal link loss.
    ///
    /// Does nothing in `Error`: a failed host stays put until someone
    /// sends a fresh start request.
    pub fn resume_scanning(&mut self) -> ConnectionState {
        if matches!(self.state, ConnectionState::Idle | ConnectionState::Disconnected) {
            self.state = ConnectionState::Scanning;
        }
        self.state
    }
}

/// How `ClientPool::acquire` satisfied a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Acquisition {
    /// The slot already bound to this peer (bond state intact).
    Reused(usize),
    /// A disconnected slot rebound to the new peer.
    Recycled(usize),
    /// A never-used slot.
    Fresh(usize),
}

#[derive(Clone, Copy)]
struct ClientSlot {
    address: Option<PeerAddress>,
    connected: bool,
}

/// Fixed table of connection objects.
///
/// The radio stack hands out a bounded number of connections; this pool
/// decides which one serves a connect request: the peer's previous slot
/// first, then any disconnected slot, then an unused one, otherwise the
/// request is refused.
pub struct ClientPool {
    slots: [ClientSlot; MAX_CONNECTIONS],
}

impl ClientPool {
    pub const fn new() -> Self {
        Self {
            slots: [ClientSlot { address: None, connected: false }; MAX_CONNECTIONS],
        }
    }

    pub fn acquire(&mut self, address: PeerAddress) -> Result<Acquisition, HostError> {
        if let Some(i) = self.slots.iter().position(|s| s.address == Some(address)) {
            return Ok(Acquisition::Reused(i));
        }
        if let Some(i) = self.slots.iter().position(|s| s.address.is_some() && !s.connected) {
            self.slots[i].address = Some(address);
            return Ok(Acquisition::Recycled(i));
        }
        if let Some(i) = self.slots.iter().position(|s| s.address.is_none()) {
            self.slots[i].address = Some(address);
            return Ok(Acquisition::Fresh(i));
        }
        Err(HostError::ResourceExhausted)
    }

    pub fn mark_connected(&mut self, slot: usize) {
        if let Some(s) = self.slots.get_mut(slot) {
            s.connected = true;
        }
    }

    /// The address stays bound so the peer can reclaim its slot later.
    pub fn mark_disconnected(&mut self, slot: usize) {
        if let Some(s) = self.slots.get_mut(slot) {
            s.connected = false;
        }
    }

    pub fn connected_count(&self) -> usize {
        self.slots.iter().filter(|s| s.connected).count()
    }
}

/// CCCD mode chosen for one Input Report characteristic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SubscribeMode {
    Notify,
    Indicate,
}

/// Properties of a discovered Input Report characteristic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReportCharacteristic {
    pub handle: u16,
    pub notify: bool,
    pub indicate: bool,
}

/// Pick a CCCD mode per characteristic: notifications when offered,
/// indications as the fallback, skip characteristics that support
/// neither. Fails only when nothing at all is subscribable.
pub fn plan_subscriptions(
    chars: &[ReportCharacteristic],
) -> Result<Vec<(u16, SubscribeMode), MAX_REPORT_CHARS>, HostError> {
    let mut plan = Vec::new();
    for c in chars {
        let mode = if c.notify {
            SubscribeMode::Notify
        } else if c.indicate {
            SubscribeMode::Indicate
        } else {
            continue;
        };
        let _ = plan.push((c.handle, mode));
    }
    if plan.is_empty() {
        return Err(HostError::NoSubscribableReports);
    }
    Ok(plan)
}
