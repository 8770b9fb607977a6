//! Keyboard acceptance policy applied to every advertisement.
//!
//! A peripheral is worth connecting to if any of these hold:
//! * its address is on the bonded allowlist (bonded keyboards often
//!   advertise with almost no payload),
//! * it advertises the HID service (0x1812),
//! * it advertises the keyboard appearance (0x03C1).

use heapless::Vec;

use crate::ble::address::PeerAddress;
use crate::ble::adv_parser;
use crate::config::MAX_BONDED_PEERS;

/// HID-over-GATT service UUID.
pub const HID_SERVICE_UUID: u16 = 0x1812;

/// GAP appearance value for a HID keyboard.
pub const APPEARANCE_KEYBOARD: u16 = 0x03C1;

/// Decides which advertisements are keyboards we want.
pub struct KeyboardFilter {
    allowlist: Vec<PeerAddress, MAX_BONDED_PEERS>,
}

impl KeyboardFilter {
    pub const fn new() -> Self {
        Self { allowlist: Vec::new() }
    }

    /// Let a bonded peer match by address alone.
    pub fn allow(&mut self, address: PeerAddress) {
        if !self.allowlist.contains(&address) {
            let _ = self.allowlist.push(address);
        }
    }

    pub fn accepts(&self, address: &PeerAddress, adv_data: &[u8]) -> bool {
        if self.allowlist.contains(address) {
            return true;
        }
        if adv_parser::contains_service_uuid16(adv_data, HID_SERVICE_UUID) {
            return true;
        }
        adv_parser::extract_appearance(adv_data) == Some(APPEARANCE_KEYBOARD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: PeerAddress = PeerAddress::new([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
    const OTHER: PeerAddress = PeerAddress::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

    #[test]
    fn accepts_hid_service_advertisement() {
        let filter = KeyboardFilter::new();
        let adv = [0x03, 0x03, 0x12, 0x18];
        assert!(filter.accepts(&ADDR, &adv));
    }

    #[test]
    fn accepts_keyboard_appearance() {
        let filter = KeyboardFilter::new();
        let adv = [0x03, 0x19, 0xC1, 0x03];
        assert!(filter.accepts(&ADDR, &adv));
    }

    #[test]
    fn rejects_non_keyboard_appearance() {
        let filter = KeyboardFilter::new();
        // 0x03C2 is a mouse.
        let adv = [0x03, 0x19, 0xC2, 0x03];
        assert!(!filter.accepts(&ADDR, &adv));
    }

    #[test]
    fn accepts_allowlisted_peer_with_empty_advertisement() {
        let mut filter = KeyboardFilter::new();
        filter.allow(ADDR);
        assert!(filter.accepts(&ADDR, &[]));
        assert!(!filter.accepts(&OTHER, &[]));
    }

    #[test]
    fn rejects_everything_else() {
        let filter = KeyboardFilter::new();
        // Battery service only.
        let adv = [0x03, 0x03, 0x0F, 0x18];
        assert!(!filter.accepts(&ADDR, &adv));
        assert!(!filter.accepts(&ADDR, &[]));
    }

    #[test]
    fn allow_is_idempotent_and_bounded() {
        let mut filter = KeyboardFilter::new();
        for _ in 0..3 {
            filter.allow(ADDR);
        }
        assert!(filter.accepts(&ADDR, &[]));
        // Fill past capacity; later peers simply stop being recorded.
        for n in 0..(MAX_BONDED_PEERS as u8 + 2) {
            filter.allow(PeerAddress::new([n; 6]));
        }
        assert!(filter.accepts(&ADDR, &[]));
    }
}
