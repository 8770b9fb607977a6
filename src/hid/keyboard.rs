//! HID keyboard report (boot protocol).
//!
//! Layout (8 bytes):
//! ```text
//! Byte 0: Modifier keys (bitfield)
//!         Bit 0 = Left Ctrl,  Bit 1 = Left Shift,
//!         Bit 2 = Left Alt,   Bit 3 = Left GUI,
//!         Bit 4 = Right Ctrl, Bit 5 = Right Shift,
//!         Bit 6 = Right Alt,  Bit 7 = Right GUI
//! Byte 1: Reserved (0x00)
//! Byte 2-7: Up to 6 simultaneous key codes (USB HID usage codes)
//! ```

/// Keyboard report size in bytes.
pub const KEYBOARD_REPORT_SIZE: usize = 8;

/// Left/right Shift bits of the modifier byte.
pub const MOD_LEFT_SHIFT: u8 = 0x02;
pub const MOD_RIGHT_SHIFT: u8 = 0x20;

/// Usage code a boot keyboard writes into every key slot when more keys
/// are down than it can report (phantom/ghost condition).
pub const ROLLOVER_ERROR: u8 = 0x01;

/// Standard HID boot-protocol keyboard report.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyboardReport {
    /// Modifier key bitfield.
    pub modifier: u8,
    /// Reserved byte (always 0x00 per HID spec).
    pub reserved: u8,
    /// Up to 6 simultaneously pressed key codes.
    pub keycodes: [u8; 6],
}

impl KeyboardReport {
    /// Create an empty (all-keys-released) report.
    pub const fn empty() -> Self {
        Self {
            modifier: 0,
            reserved: 0,
            keycodes: [0; 6],
        }
    }

    /// Parse from raw BLE HID notification bytes.
    ///
    /// Some keyboards pad their notifications; trailing bytes beyond the
    /// 8-byte boot layout are ignored.
    pub fn from_ble_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < KEYBOARD_REPORT_SIZE {
            return None;
        }
        Some(Self {
            modifier: data[0],
            reserved: data[1],
            keycodes: [data[2], data[3], data[4], data[5], data[6], data[7]],
        })
    }

    /// `true` if any key slot carries the rollover error code. Such a
    /// report describes no valid key set and must not update key state.
    pub fn has_rollover_error(&self) -> bool {
        self.keycodes.iter().any(|&k| k == ROLLOVER_ERROR)
    }

    /// `true` while either Shift is held in this report.
    pub fn shift_active(&self) -> bool {
        self.modifier & (MOD_LEFT_SHIFT | MOD_RIGHT_SHIFT) != 0
    }

    /// `true` if `keycode` appears in one of the key slots.
    pub fn contains(&self, keycode: u8) -> bool {
        self.keycodes.iter().any(|&k| k == keycode)
    }

    /// The active (non-zero) key codes, in slot order.
    pub fn pressed_keycodes(&self) -> impl Iterator<Item = u8> + '_ {
        self.keycodes.iter().copied().filter(|&k| k != 0)
    }

    /// Returns `true` if no keys and no modifiers are active.
    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.modifier == 0 && self.keycodes.iter().all(|&k| k == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_report() {
        let report = KeyboardReport::from_ble_bytes(&[0x02, 0x00, 0x04, 0, 0, 0, 0, 0]).unwrap();
        assert_eq!(report.modifier, 0x02);
        assert_eq!(report.keycodes[0], 0x04);
        assert!(!report.is_empty());
    }

    #[test]
    fn parse_rejects_short_payload() {
        assert!(KeyboardReport::from_ble_bytes(&[0x00, 0x00, 0x04]).is_none());
        assert!(KeyboardReport::from_ble_bytes(&[]).is_none());
    }

    #[test]
    fn parse_ignores_trailing_padding() {
        let report =
            KeyboardReport::from_ble_bytes(&[0, 0, 0x05, 0, 0, 0, 0, 0, 0xAA, 0xBB]).unwrap();
        assert_eq!(report.keycodes[0], 0x05);
        assert!(!report.contains(0xAA));
    }

    #[test]
    fn rollover_detected_in_any_slot() {
        for slot in 0..6 {
            let mut data = [0u8; 8];
            data[2 + slot] = ROLLOVER_ERROR;
            let report = KeyboardReport::from_ble_bytes(&data).unwrap();
            assert!(report.has_rollover_error(), "slot {slot}");
        }
        let clean = KeyboardReport::from_ble_bytes(&[0, 0, 0x04, 0x05, 0, 0, 0, 0]).unwrap();
        assert!(!clean.has_rollover_error());
    }

    #[test]
    fn either_shift_bit_counts() {
        let left = KeyboardReport { modifier: MOD_LEFT_SHIFT, ..KeyboardReport::empty() };
        let right = KeyboardReport { modifier: MOD_RIGHT_SHIFT, ..KeyboardReport::empty() };
        let ctrl = KeyboardReport { modifier: 0x01, ..KeyboardReport::empty() };
        assert!(left.shift_active());
        assert!(right.shift_active());
        assert!(!ctrl.shift_active());
    }

    #[test]
    fn pressed_keycodes_skips_free_slots() {
        let report = KeyboardReport::from_ble_bytes(&[0, 0, 0x04, 0, 0x1D, 0, 0, 0]).unwrap();
        let keys: heapless::Vec<u8, 6> = report.pressed_keycodes().collect();
        assert_eq!(keys.as_slice(), &[0x04, 0x1D]);
    }
}
