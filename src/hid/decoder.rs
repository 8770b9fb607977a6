//! Differential decoder for boot-protocol keyboard reports.
//!
//! A keyboard notification carries the complete set of held keys, not
//! transitions. The decoder diffs each report against the previous one
//! and keeps a slot table binding every held usage code to the logical
//! key it produced at press time, so a key pressed with Shift held is
//! released as that same shifted key even if Shift went up first.

use heapless::Vec;

use crate::config::{MAX_EVENTS_PER_REPORT, MAX_PRESSED_KEYS};
use crate::hid::keyboard::KeyboardReport;
use crate::hid::keymap;
use crate::input::event::{Key, KeyEvent};

/// Consumer-control (media key) reports arrive on the same
/// characteristic as 3-byte payloads.
const MEDIA_REPORT_SIZE: usize = 3;

/// What a single notification payload turned out to be.
#[derive(Clone, Debug, PartialEq)]
pub enum Decoded {
    /// Boot keyboard report, with the key transitions it caused
    /// (possibly none).
    Keys(Vec<KeyEvent, MAX_EVENTS_PER_REPORT>),
    /// 3-byte consumer-control report (volume keys and friends).
    Media,
    /// Rollover error report, discarded without touching key state.
    Rollover,
    /// Too short to be any report we know.
    Malformed,
}

/// Decode statistics. Decode-level problems never stop the pipeline;
/// they are counted here and visible in logs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DecodeStats {
    /// Reports discarded because a key slot carried the rollover code.
    pub rollover_reports: u32,
    /// Consumer-control payloads seen (not decoded).
    pub media_reports: u32,
    /// Payloads too short to parse.
    pub malformed_reports: u32,
}

/// One held key: the raw usage code and the logical key bound to it
/// when it was pressed.
#[derive(Clone, Copy)]
struct PressedSlot {
    keycode: u8,
    key: Key,
}

/// Tracks held keys across reports and turns each report into events.
///
/// Owned exclusively by the connection task; only the resulting events
/// cross into the shared queue.
pub struct ReportDecoder {
    prev: KeyboardReport,
    slots: [Option<PressedSlot>; MAX_PRESSED_KEYS],
    stats: DecodeStats,
}

impl ReportDecoder {
    pub const fn new() -> Self {
        Self {
            prev: KeyboardReport::empty(),
            slots: [None; MAX_PRESSED_KEYS],
            stats: DecodeStats {
                rollover_reports: 0,
                media_reports: 0,
                malformed_reports: 0,
            },
        }
    }

    /// Decode one notification payload against the running key state.
    pub fn decode(&mut self, data: &[u8], timestamp_ms: u32) -> Decoded {
        if data.len() == MEDIA_REPORT_SIZE {
            self.stats.media_reports = self.stats.media_reports.wrapping_add(1);
            return Decoded::Media;
        }
        let Some(report) = KeyboardReport::from_ble_bytes(data) else {
            self.stats.malformed_reports = self.stats.malformed_reports.wrapping_add(1);
            return Decoded::Malformed;
        };
        if report.has_rollover_error() {
            self.stats.rollover_reports = self.stats.rollover_reports.wrapping_add(1);
            return Decoded::Rollover;
        }

        let mut events: Vec<KeyEvent, MAX_EVENTS_PER_REPORT> = Vec::new();
        let shift = report.shift_active();

        // Presses: usage codes present now but not before. Translation
        // uses the new report's shift state; the result is bound to a
        // slot so the release can reproduce it.
        for keycode in report.pressed_keycodes() {
            if self.prev.contains(keycode) || self.slot_of(keycode).is_some() {
                continue;
            }
            if let Some(key) = keymap::translate(keycode, shift) {
                self.bind(keycode, key);
                let _ = events.push(KeyEvent::press(key, timestamp_ms));
            }
        }

        // Releases: usage codes that vanished. The bound key wins; a key
        // held from before the slot table knew it falls back to an
        // unshifted translation.
        let prev = self.prev;
        for keycode in prev.pressed_keycodes() {
            if report.contains(keycode) {
                continue;
            }
            let key = match self.unbind(keycode) {
                Some(key) => Some(key),
                None => keymap::translate(keycode, false),
            };
            if let Some(key) = key {
                let _ = events.push(KeyEvent::release(key, timestamp_ms));
            }
        }

        self.prev = report;
        Decoded::Keys(events)
    }

    /// Forced-release sweep: one release per held key, then a full
    /// reset. The connection task calls this when the link drops so no
    /// key stays stuck down.
    pub fn release_all(&mut self, timestamp_ms: u32) -> Vec<KeyEvent, MAX_PRESSED_KEYS> {
        let mut events = Vec::new();
        for slot in self.slots.iter_mut() {
            if let Some(held) = slot.take() {
                let _ = events.push(KeyEvent::release(held.key, timestamp_ms));
            }
        }
        self.prev = KeyboardReport::empty();
        events
    }

    pub fn stats(&self) -> DecodeStats {
        self.stats
    }

    fn slot_of(&self, keycode: u8) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| matches!(slot, Some(held) if held.keycode == keycode))
    }

    fn bind(&mut self, keycode: u8, key: Key) {
        if let Some(free) = self.slots.iter_mut().find(|slot| slot.is_none()) {
            *free = Some(PressedSlot { keycode, key });
        }
    }

    fn unbind(&mut self, keycode: u8) -> Option<Key> {
        let index = self.slot_of(keycode)?;
        self.slots[index].take().map(|held| held.key)
    }
}
