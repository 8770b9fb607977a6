//! hogkbd firmware entry point (nRF52840 + SoftDevice S140).
//!
//! Three tasks:
//! - `softdevice_task` - runs the SoftDevice event loop.
//! - `host_task` - the BLE keyboard host (scan, connect, secure,
//!   subscribe, decode).
//! - `consumer_task` - the UI stand-in: polls the key event queue at a
//!   fixed tick and prints what it reads, next to the host's status
//!   events.
//!
//! Everything the tasks share is handed over explicitly: the command
//! and status channels and the event queue are statics passed by
//! reference, never looked up globally from inside a module.

#![no_std]
#![no_main]

use defmt::{info, unwrap, warn};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_nrf::interrupt::Priority;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, Ticker};
use nrf_softdevice::{raw, Softdevice};
use panic_probe as _;

use hogkbd::ble::{host, CommandRx, EventRx, EventTx, HostCommand, HostEvent};
use hogkbd::config;
use hogkbd::input::{KeyInput, SharedEventQueue};

/// Decoded key events, notification path -> UI poll path.
static EVENT_QUEUE: SharedEventQueue = SharedEventQueue::new();

/// Consumer -> host commands.
static COMMANDS: Channel<CriticalSectionRawMutex, HostCommand, 4> = Channel::new();

/// Host -> consumer status events.
static EVENTS: Channel<CriticalSectionRawMutex, HostEvent, 8> = Channel::new();

/// UI poll cadence.
const CONSUMER_TICK_MS: u64 = 20;

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

#[embassy_executor::task]
async fn host_task(
    sd: &'static Softdevice,
    commands: CommandRx,
    events: EventTx,
    queue: &'static SharedEventQueue,
) -> ! {
    host::keyboard_host_task(sd, commands, events, queue).await
}

/// Placeholder for the real UI: drains the input adapter once per tick
/// and logs every key transition and host status change.
#[embassy_executor::task]
async fn consumer_task(input: KeyInput, events: EventRx) -> ! {
    let mut ticker = Ticker::every(Duration::from_millis(CONSUMER_TICK_MS));
    loop {
        while let Ok(event) = events.try_receive() {
            match event {
                HostEvent::StateChanged(state) => info!("host state: {}", state),
                HostEvent::Ready(name) => info!("keyboard ready: {}", name.as_str()),
                HostEvent::Disconnected => info!("keyboard disconnected"),
                HostEvent::Fault(err) => warn!("host fault: {}", err),
            }
        }

        while input.has_event() {
            if let Some(key) = input.next_event() {
                info!(
                    "{} {} at {} ms",
                    key.key,
                    if key.pressed { "pressed" } else { "released" },
                    key.timestamp_ms
                );
            }
        }

        ticker.next().await;
    }
}

fn softdevice_config() -> nrf_softdevice::Config {
    nrf_softdevice::Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: config::MAX_CONNECTIONS as u8,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t { att_mtu: 256 }),
        gatts_attr_tab_size: Some(raw::ble_gatts_cfg_attr_tab_size_t {
            attr_tab_size: raw::BLE_GATTS_ATTR_TAB_SIZE_DEFAULT,
        }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 0,
            periph_role_count: 0,
            central_role_count: config::MAX_CONNECTIONS as u8,
            central_sec_count: 1,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        gap_device_name: Some(raw::ble_gap_cfg_device_name_t {
            p_value: b"hogkbd" as *const u8 as _,
            current_len: 6,
            max_len: 6,
            write_perm: unsafe { core::mem::zeroed() },
            _bitfield_1: raw::ble_gap_cfg_device_name_t::new_bitfield_1(
                raw::BLE_GATTS_VLOC_STACK as u8,
            ),
        }),
        ..Default::default()
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("hogkbd starting");

    // The SoftDevice reserves the highest interrupt priorities; keep
    // the application's time and GPIO interrupts out of its range.
    let mut nrf_config = embassy_nrf::config::Config::default();
    nrf_config.gpiote_interrupt_priority = Priority::P2;
    nrf_config.time_interrupt_priority = Priority::P2;
    let _peripherals = embassy_nrf::init(nrf_config);

    let sd = Softdevice::enable(&softdevice_config());

    unwrap!(spawner.spawn(softdevice_task(sd)));
    unwrap!(spawner.spawn(host_task(
        sd,
        COMMANDS.receiver(),
        EVENTS.sender(),
        &EVENT_QUEUE,
    )));
    unwrap!(spawner.spawn(consumer_task(
        KeyInput::new(&EVENT_QUEUE),
        EVENTS.receiver(),
    )));

    // Kick off scanning; afterwards the host drives itself until a
    // fault, which needs a fresh Start.
    COMMANDS.send(HostCommand::Start).await;
}
