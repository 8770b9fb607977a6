//! Stack-independent peer address.

/// A 6-byte BLE device address.
///
/// Kept separate from the SoftDevice's `Address` type so the filter,
/// bond list and their tests compile on the host. The address type
/// (public/random) is re-learned from the live advertisement when
/// connecting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeerAddress(pub [u8; 6]);

impl PeerAddress {
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    pub const fn bytes(&self) -> [u8; 6] {
        self.0
    }
}
