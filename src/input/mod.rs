//! UI-facing input layer: the shared event queue and the polled adapter.
//!
//! The BLE notification path produces key events; the UI tick consumes
//! them. The two sides never share the decoder, only this queue.

pub mod event;
pub mod queue;

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::input::event::KeyEvent;
use crate::input::queue::EventQueue;

/// Key event queue shared between the notification path (producer) and
/// the UI poll path (consumer).
///
/// The lock is held only for the O(1) ring-buffer update, so neither
/// side ever stalls the other for long.
pub struct SharedEventQueue {
    inner: Mutex<CriticalSectionRawMutex, RefCell<EventQueue>>,
}

impl SharedEventQueue {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(EventQueue::new())),
        }
    }

    /// Producer side. A full queue overwrites its oldest event.
    pub fn push(&self, event: KeyEvent) {
        self.inner.lock(|q| q.borrow_mut().enqueue(event));
    }

    pub fn has_event(&self) -> bool {
        self.inner.lock(|q| !q.borrow().is_empty())
    }

    pub fn next_event(&self) -> Option<KeyEvent> {
        self.inner.lock(|q| q.borrow_mut().dequeue())
    }

    /// Events lost to overwrites since boot.
    pub fn dropped(&self) -> u32 {
        self.inner.lock(|q| q.borrow().dropped())
    }
}

/// What the UI layer polls every tick.
///
/// `next_event` never blocks; `None` means no key is pending. Handed to
/// the consumer task as a plain value, no global lookup involved.
#[derive(Clone, Copy)]
pub struct KeyInput {
    queue: &'static SharedEventQueue,
}

impl KeyInput {
    pub const fn new(queue: &'static SharedEventQueue) -> Self {
        Self { queue }
    }

    pub fn has_event(&self) -> bool {
        self.queue.has_event()
    }

    pub fn next_event(&self) -> Option<KeyEvent> {
        self.queue.next_event()
    }
}
