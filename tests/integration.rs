//! Integration tests for the hogkbd host-testable pipeline.
//!
//! Drives the pure core end to end the way the firmware does: raw
//! notification bytes through the decoder, events through the shared
//! queue, out via the polled input adapter; plus the filter and
//! lifecycle decisions around them.

use hogkbd::ble::lifecycle::{plan_subscriptions, ReportCharacteristic, SubscribeMode};
use hogkbd::{
    ConnectionState, Decoded, HostError, Key, KeyEvent, KeyInput, KeyboardFilter, Lifecycle,
    LinkEvent, PeerAddress, ReportDecoder, SharedEventQueue,
};

/// Feed one report and push whatever it decodes into the queue, the
/// way the notification path does.
fn pump(decoder: &mut ReportDecoder, queue: &SharedEventQueue, report: &[u8], at: u32) {
    if let Decoded::Keys(events) = decoder.decode(report, at) {
        for event in &events {
            queue.push(*event);
        }
    }
}

fn drain(input: &KeyInput) -> Vec<KeyEvent> {
    let mut out = Vec::new();
    while input.has_event() {
        out.extend(input.next_event());
    }
    out
}

#[test]
fn shifted_key_travels_the_whole_pipeline() {
    static QUEUE: SharedEventQueue = SharedEventQueue::new();
    let input = KeyInput::new(&QUEUE);
    let mut decoder = ReportDecoder::new();

    // Shift + 'a', then all released.
    pump(&mut decoder, &QUEUE, &[0x02, 0, 0x04, 0, 0, 0, 0, 0], 100);
    pump(&mut decoder, &QUEUE, &[0x00, 0, 0, 0, 0, 0, 0, 0], 150);

    let events = drain(&input);
    assert_eq!(
        events,
        vec![
            KeyEvent::press(Key::Char('A'), 100),
            KeyEvent::release(Key::Char('A'), 150),
        ]
    );
    assert!(!input.has_event());
    assert_eq!(input.next_event(), None);
}

#[test]
fn two_key_chord_releases_in_order() {
    static QUEUE: SharedEventQueue = SharedEventQueue::new();
    let input = KeyInput::new(&QUEUE);
    let mut decoder = ReportDecoder::new();

    pump(&mut decoder, &QUEUE, &[0, 0, 0x04, 0x05, 0, 0, 0, 0], 0);
    pump(&mut decoder, &QUEUE, &[0, 0, 0x04, 0, 0, 0, 0, 0], 1);
    pump(&mut decoder, &QUEUE, &[0, 0, 0, 0, 0, 0, 0, 0], 2);

    let events = drain(&input);
    assert_eq!(
        events,
        vec![
            KeyEvent::press(Key::Char('a'), 0),
            KeyEvent::press(Key::Char('b'), 0),
            KeyEvent::release(Key::Char('b'), 1),
            KeyEvent::release(Key::Char('a'), 2),
        ]
    );
}

#[test]
fn rollover_and_repeats_produce_nothing() {
    static QUEUE: SharedEventQueue = SharedEventQueue::new();
    let input = KeyInput::new(&QUEUE);
    let mut decoder = ReportDecoder::new();

    let chord = [0, 0, 0x04, 0x05, 0, 0, 0, 0];
    pump(&mut decoder, &QUEUE, &chord, 0);
    assert_eq!(drain(&input).len(), 2);

    // The same report again, then a rollover burst: silence.
    pump(&mut decoder, &QUEUE, &chord, 1);
    pump(&mut decoder, &QUEUE, &[0, 0, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01], 2);
    assert!(drain(&input).is_empty());

    // State survived both: the chord still releases.
    pump(&mut decoder, &QUEUE, &[0, 0, 0, 0, 0, 0, 0, 0], 3);
    assert_eq!(drain(&input).len(), 2);
}

#[test]
fn disconnect_releases_every_held_key() {
    static QUEUE: SharedEventQueue = SharedEventQueue::new();
    let input = KeyInput::new(&QUEUE);
    let mut decoder = ReportDecoder::new();

    pump(&mut decoder, &QUEUE, &[0x02, 0, 0x04, 0x05, 0x06, 0, 0, 0], 0);
    let pressed = drain(&input);
    assert_eq!(pressed.len(), 3);

    // Link loss: the forced-release sweep feeds the queue.
    for event in &decoder.release_all(50) {
        QUEUE.push(*event);
    }

    let released = drain(&input);
    assert_eq!(released.len(), 3);
    assert!(released.iter().all(|e| !e.pressed && e.timestamp_ms == 50));
    // Shifted binding held through the sweep.
    assert!(released.contains(&KeyEvent::release(Key::Char('A'), 50)));

    // Nothing is stuck: a fresh sweep has nothing to do.
    assert!(decoder.release_all(60).is_empty());
}

#[test]
fn queue_overflow_keeps_the_freshest_events() {
    static QUEUE: SharedEventQueue = SharedEventQueue::new();
    let input = KeyInput::new(&QUEUE);

    // Push well past capacity without draining.
    for n in 0..300u32 {
        QUEUE.push(KeyEvent::press(Key::Char('x'), n));
    }

    let events = drain(&input);
    assert_eq!(events.len(), 127);
    assert_eq!(events.first().unwrap().timestamp_ms, 300 - 127);
    assert_eq!(events.last().unwrap().timestamp_ms, 299);
    assert_eq!(QUEUE.dropped(), 300 - 127);
}

#[test]
fn connect_timeout_faults_the_lifecycle() {
    let mut lifecycle = Lifecycle::new();
    lifecycle.on_event(LinkEvent::StartRequested);
    lifecycle.on_event(LinkEvent::KeyboardAccepted);
    assert_eq!(lifecycle.state(), ConnectionState::Connecting);

    // The driver raises this once the 5 s deadline passes.
    lifecycle.on_event(LinkEvent::Failed(HostError::ConnectTimeout));
    assert_eq!(lifecycle.state(), ConnectionState::Error);
    assert_eq!(lifecycle.last_error(), Some(HostError::ConnectTimeout));

    // No auto-retry out of Error.
    assert_eq!(lifecycle.resume_scanning(), ConnectionState::Error);
}

#[test]
fn filter_accepts_keyboards_and_bonded_peers_only() {
    let bonded = PeerAddress::new([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
    let stranger = PeerAddress::new([0xAA; 6]);

    let mut filter = KeyboardFilter::new();
    filter.allow(bonded);

    let hid_service = [0x03, 0x03, 0x12, 0x18];
    let keyboard_appearance = [0x03, 0x19, 0xC1, 0x03];
    let heart_rate = [0x03, 0x03, 0x0D, 0x18];

    assert!(filter.accepts(&stranger, &hid_service));
    assert!(filter.accepts(&stranger, &keyboard_appearance));
    assert!(filter.accepts(&bonded, &heart_rate));
    assert!(filter.accepts(&bonded, &[]));
    assert!(!filter.accepts(&stranger, &heart_rate));
    assert!(!filter.accepts(&stranger, &[]));
}

#[test]
fn subscription_plan_prefers_notify() {
    let chars = [
        ReportCharacteristic { handle: 20, notify: true, indicate: true },
        ReportCharacteristic { handle: 21, notify: false, indicate: true },
        ReportCharacteristic { handle: 22, notify: false, indicate: false },
    ];

    let plan = plan_subscriptions(&chars).unwrap();
    assert_eq!(
        plan.as_slice(),
        &[(20, SubscribeMode::Notify), (21, SubscribeMode::Indicate)]
    );

    let none = [ReportCharacteristic { handle: 30, notify: false, indicate: false }];
    assert_eq!(plan_subscriptions(&none), Err(HostError::NoSubscribableReports));
}

#[test]
fn indicate_only_keyboard_still_comes_up() {
    // Some keyboards expose their sole Input Report indicate-only; the
    // plan must fall back to indications instead of failing the link.
    let chars = [ReportCharacteristic { handle: 40, notify: false, indicate: true }];
    let plan = plan_subscriptions(&chars).unwrap();
    assert_eq!(plan.as_slice(), &[(40, SubscribeMode::Indicate)]);
}
