//! Application-wide constants and compile-time configuration.
//!
//! Timing parameters, protocol constants and buffer sizes live here so
//! they can be tuned in one place.

// BLE scanning

/// Scan interval (in 0.625 ms units). 100 = 62.5 ms.
pub const BLE_SCAN_INTERVAL_UNITS: u32 = 100;

/// Scan window (in 0.625 ms units). Equal to the interval, so the radio
/// listens continuously while scanning.
pub const BLE_SCAN_WINDOW_UNITS: u32 = 100;

// BLE connection

/// BLE connection interval range (in 1.25 ms units).
/// 12 = 15 ms, plenty for keystrokes without hogging the radio.
pub const BLE_CONN_INTERVAL_MIN: u16 = 12;
pub const BLE_CONN_INTERVAL_MAX: u16 = 12;

/// BLE slave latency (number of connection events the peripheral can skip).
pub const BLE_SLAVE_LATENCY: u16 = 0;

/// BLE supervision timeout (in 10 ms units). 150 = 1.5 s.
pub const BLE_SUP_TIMEOUT: u16 = 150;

/// Abandon a connection attempt that has not completed within this window.
pub const BLE_CONNECT_TIMEOUT_MS: u64 = 5_000;

/// Connection objects the host hands out before reporting exhaustion.
/// Must not exceed the central link count configured in the SoftDevice.
pub const MAX_CONNECTIONS: usize = 2;

// Security

/// Passkey sent if a peer ever demands passkey entry during pairing.
pub const PAIRING_PASSKEY: [u8; 6] = *b"123456";

// Input pipeline

/// Key event ring buffer slots. One slot always stays free, so the
/// queue holds up to `EVENT_QUEUE_CAPACITY - 1` events.
pub const EVENT_QUEUE_CAPACITY: usize = 128;

/// Simultaneous keys a boot-protocol keyboard can report.
pub const MAX_PRESSED_KEYS: usize = 6;

/// Upper bound of key events a single report can produce
/// (every slot released plus every slot newly pressed).
pub const MAX_EVENTS_PER_REPORT: usize = 2 * MAX_PRESSED_KEYS;

/// Input Report characteristics tracked per HID service.
pub const MAX_REPORT_CHARS: usize = 4;

// Bonded-peer storage

/// Maximum number of bonded keyboards tracked in storage.
pub const MAX_BONDED_PEERS: usize = 4;

/// Flash page index where bond storage starts (4 KB per page on nRF52840).
pub const STORAGE_FLASH_PAGE_START: u32 = 240;

/// Number of flash pages reserved for bond storage.
pub const STORAGE_FLASH_PAGE_COUNT: u32 = 4;
