//! BLE GATT HID client - discovery and Input Report subscription.
//!
//! After the link is encrypted, this module:
//! 1. Discovers the HID Service (UUID 0x1812), collecting **every**
//!    Input Report characteristic (0x2A4D) it exposes - keyboards with
//!    separate keyboard/media report instances have several.
//! 2. Writes Protocol Mode (0x2A4E) to Boot Protocol so the keyboard
//!    Input Report carries the fixed 8-byte layout.
//! 3. Subscribes each Input Report per the subscription plan:
//!    notifications when offered, indications as the fallback.
//! 4. Feeds every report payload through the decoder and pushes the
//!    resulting key events into the shared queue.
//!
//! The `gatt_client::Client` impl is written by hand instead of the
//! `#[gatt_client]` macro because the macro binds one characteristic
//! per field and would drop all but the first 0x2A4D instance.

use defmt::{debug, info, warn};
use embassy_time::Instant;
use heapless::Vec;
use nrf_softdevice::ble::gatt_client::{self, Characteristic, Descriptor, DiscoverError, HvxType};
use nrf_softdevice::ble::{Connection, Uuid};

use crate::ble::lifecycle::{plan_subscriptions, ReportCharacteristic, SubscribeMode};
use crate::config::MAX_REPORT_CHARS;
use crate::error::HostError;
use crate::hid::decoder::{Decoded, ReportDecoder};
use crate::input::SharedEventQueue;

const UUID_HID_SERVICE: Uuid = Uuid::new_16(0x1812);
const UUID_INPUT_REPORT: Uuid = Uuid::new_16(0x2a4d);
const UUID_PROTOCOL_MODE: Uuid = Uuid::new_16(0x2a4e);
const UUID_CCCD: Uuid = Uuid::new_16(0x2902);

/// Longest report payload copied out of a notification.
const MAX_REPORT_LEN: usize = 20;

/// CCCD values, little-endian.
const CCCD_NOTIFY: [u8; 2] = [0x01, 0x00];
const CCCD_INDICATE: [u8; 2] = [0x02, 0x00];

/// One discovered Input Report instance.
struct InputReportChar {
    value_handle: u16,
    cccd_handle: Option<u16>,
    notify: bool,
    indicate: bool,
}

/// GATT client state for the HID-over-GATT service.
pub struct HidServiceClient {
    reports: Vec<InputReportChar, MAX_REPORT_CHARS>,
    protocol_mode_handle: Option<u16>,
}

pub enum HidServiceClientEvent {
    /// A notification or indication on one of the Input Reports.
    InputReport { handle: u16, data: Vec<u8, MAX_REPORT_LEN> },
}

impl gatt_client::Client for HidServiceClient {
    type Event = HidServiceClientEvent;

    fn on_hvx(
        &self,
        _conn: &Connection,
        _type: HvxType,
        handle: u16,
        data: &[u8],
    ) -> Option<Self::Event> {
        if !self.reports.iter().any(|r| r.value_handle == handle) {
            return None;
        }
        let mut copy = Vec::new();
        let take = data.len().min(MAX_REPORT_LEN);
        let _ = copy.extend_from_slice(&data[..take]);
        Some(HidServiceClientEvent::InputReport { handle, data: copy })
    }

    fn uuid() -> Uuid {
        UUID_HID_SERVICE
    }

    fn new_undiscovered(_conn: Connection) -> Self {
        Self {
            reports: Vec::new(),
            protocol_mode_handle: None,
        }
    }

    fn discovered_characteristic(
        &mut self,
        characteristic: &Characteristic,
        descriptors: &[Descriptor],
    ) {
        let Some(uuid) = characteristic.uuid else {
            return;
        };
        if uuid == UUID_INPUT_REPORT {
            let cccd_handle = descriptors
                .iter()
                .find(|d| d.uuid == Some(UUID_CCCD))
                .map(|d| d.handle);
            let _ = self.reports.push(InputReportChar {
                value_handle: characteristic.handle_value,
                cccd_handle,
                notify: characteristic.props.notify() != 0,
                indicate: characteristic.props.indicate() != 0,
            });
        } else if uuid == UUID_PROTOCOL_MODE {
            self.protocol_mode_handle = Some(characteristic.handle_value);
        }
    }

    fn discovery_complete(&mut self) -> Result<(), DiscoverError> {
        if self.reports.is_empty() {
            return Err(DiscoverError::ServiceIncomplete);
        }
        Ok(())
    }
}

/// Discover the HID service and pin the report layout.
pub async fn discover(conn: &Connection) -> Result<HidServiceClient, HostError> {
    info!("discovering HID service");

    let client: HidServiceClient = gatt_client::discover(conn)
        .await
        .map_err(|_| HostError::HidServiceNotFound)?;
    info!("{} input report characteristics found", client.reports.len());

    // Boot protocol gives the fixed 8-byte keyboard layout. Devices
    // that only speak Report Protocol refuse the write but usually
    // send the same bytes anyway.
    if let Some(handle) = client.protocol_mode_handle {
        match gatt_client::write(conn, handle, &[0]).await {
            Ok(()) => info!("boot protocol selected"),
            Err(_) => warn!("peer kept report protocol"),
        }
    }

    Ok(client)
}

/// Enable every Input Report subscription the plan allows.
///
/// Notify is preferred, indicate is the per-characteristic fallback; a
/// characteristic without a CCCD cannot deliver either and is skipped.
/// Fails only when nothing at all could be subscribed.
pub async fn subscribe(conn: &Connection, client: &HidServiceClient) -> Result<usize, HostError> {
    let mut chars: Vec<ReportCharacteristic, MAX_REPORT_CHARS> = Vec::new();
    for report in &client.reports {
        let _ = chars.push(ReportCharacteristic {
            handle: report.value_handle,
            notify: report.notify && report.cccd_handle.is_some(),
            indicate: report.indicate && report.cccd_handle.is_some(),
        });
    }

    let plan = plan_subscriptions(&chars)?;
    for &(handle, mode) in plan.iter() {
        let Some(report) = client.reports.iter().find(|r| r.value_handle == handle) else {
            continue;
        };
        let Some(cccd) = report.cccd_handle else {
            continue;
        };
        let value = match mode {
            SubscribeMode::Notify => CCCD_NOTIFY,
            SubscribeMode::Indicate => CCCD_INDICATE,
        };
        gatt_client::write(conn, cccd, &value)
            .await
            .map_err(|_| HostError::SubscribeFailed)?;
        debug!("handle {}: {}", handle, mode);
    }

    info!("subscribed to {} input reports", plan.len());
    Ok(plan.len())
}

/// Pump notifications into the decoder until the connection drops.
///
/// Runs on the connection task; the decoder is owned here exclusively,
/// so decoding and the caller's forced-release sweep can never
/// interleave. Only the finished events cross into the shared queue,
/// each enqueue a single short critical section.
pub async fn run_notification_loop(
    conn: &Connection,
    client: &HidServiceClient,
    decoder: &mut ReportDecoder,
    queue: &'static SharedEventQueue,
) {
    info!("input session started");

    let _result = gatt_client::run(conn, client, |event| match event {
        HidServiceClientEvent::InputReport { handle: _, data } => {
            let now_ms = Instant::now().as_millis() as u32;
            match decoder.decode(&data, now_ms) {
                Decoded::Keys(events) => {
                    for event in &events {
                        queue.push(*event);
                    }
                }
                Decoded::Media => debug!("media report: {=[u8]:x}", &data[..]),
                Decoded::Rollover => warn!("rollover report discarded"),
                Decoded::Malformed => {
                    warn!("short report discarded ({} bytes)", data.len())
                }
            }
        }
    })
    .await;

    info!("input session ended: {}", decoder.stats());
}
