//! BLE GAP scanner - finds the next keyboard to connect to.
//!
//! Uses the SoftDevice Central-role scanning API. The scan runs until
//! one advertisement passes the keyboard filter; accepting a device and
//! stopping the scan are a single step, because the SoftDevice cannot
//! start a connection while scanning.

use defmt::{debug, info, warn};
use nrf_softdevice::ble::central;
use nrf_softdevice::Softdevice;

use crate::ble::address::PeerAddress;
use crate::ble::adv_parser::extract_name;
use crate::ble::filter::KeyboardFilter;
use crate::ble::KeyboardCandidate;
use crate::config::{BLE_SCAN_INTERVAL_UNITS, BLE_SCAN_WINDOW_UNITS};
use crate::error::HostError;

/// Display name for a candidate: the advertised local name copied out
/// of the (callback-scoped) buffer, truncated to fit, or a placeholder
/// when the advertisement carries none.
fn display_name(adv_data: &[u8]) -> heapless::String<32> {
    let mut name = heapless::String::new();
    match extract_name(adv_data) {
        Some(s) => {
            for c in s.chars() {
                if name.push(c).is_err() {
                    break;
                }
            }
        }
        None => {
            let _ = name.push_str("Unknown");
        }
    }
    name
}

/// Scan until `filter` accepts a peripheral and return it.
///
/// The candidate carries copies of everything the host needs; the
/// advertisement buffer itself is only valid inside the callback.
pub async fn find_keyboard(
    sd: &Softdevice,
    filter: &KeyboardFilter,
) -> Result<KeyboardCandidate, HostError> {
    let config = central::ScanConfig {
        // Active scan to retrieve scan-response data (device names).
        active: true,
        interval: BLE_SCAN_INTERVAL_UNITS,
        window: BLE_SCAN_WINDOW_UNITS,
        ..Default::default()
    };

    info!("scanning for a keyboard");

    let result = central::scan(sd, &config, |params| {
        let data =
            unsafe { core::slice::from_raw_parts(params.data.p_data, params.data.len as usize) };
        let peer = PeerAddress::new(params.peer_addr.addr);

        if !filter.accepts(&peer, data) {
            return None; // keep scanning
        }

        let candidate = KeyboardCandidate {
            address: nrf_softdevice::ble::Address::from_raw(params.peer_addr),
            name: display_name(data),
            rssi: params.rssi,
        };
        debug!(
            "accepting {} (RSSI {} dBm)",
            candidate.name.as_str(),
            candidate.rssi
        );
        Some(candidate) // stops the scan
    })
    .await;

    match result {
        Ok(candidate) => {
            info!("keyboard found: {}", candidate.name.as_str());
            Ok(candidate)
        }
        Err(err) => {
            warn!("scan aborted: {:?}", err);
            Err(HostError::ScanFailed)
        }
    }
}
