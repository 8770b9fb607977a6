//! Fixed-capacity ring buffer of key events.
//!
//! Written from the BLE notification path, drained from the UI poll
//! path. When the buffer is full the oldest event is overwritten, so a
//! slow consumer sees the freshest keystrokes rather than stale ones.

use crate::config::EVENT_QUEUE_CAPACITY;
use crate::input::event::KeyEvent;

/// Ring buffer of key events.
///
/// `head == tail` means empty; one slot stays unused, so up to
/// `EVENT_QUEUE_CAPACITY - 1` events are held at once. Every operation
/// is O(1), which keeps the critical section in the shared wrapper
/// short.
pub struct EventQueue {
    buf: [Option<KeyEvent>; EVENT_QUEUE_CAPACITY],
    head: usize,
    tail: usize,
    dropped: u32,
}

impl EventQueue {
    pub const fn new() -> Self {
        Self {
            buf: [None; EVENT_QUEUE_CAPACITY],
            head: 0,
            tail: 0,
            dropped: 0,
        }
    }

    /// Append an event. A full queue advances the tail first, discarding
    /// exactly the oldest event so the new one always fits.
    pub fn enqueue(&mut self, event: KeyEvent) {
        let next = (self.head + 1) % EVENT_QUEUE_CAPACITY;
        if next == self.tail {
            self.tail = (self.tail + 1) % EVENT_QUEUE_CAPACITY;
            self.dropped = self.dropped.wrapping_add(1);
        }
        self.buf[self.head] = Some(event);
        self.head = next;
    }

    /// Remove and return the oldest event, `None` when empty.
    pub fn dequeue(&mut self) -> Option<KeyEvent> {
        if self.head == self.tail {
            return None;
        }
        let event = self.buf[self.tail].take();
        self.tail = (self.tail + 1) % EVENT_QUEUE_CAPACITY;
        event
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    pub fn len(&self) -> usize {
        (self.head + EVENT_QUEUE_CAPACITY - self.tail) % EVENT_QUEUE_CAPACITY
    }

    /// Events overwritten before they were consumed.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════
