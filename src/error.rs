//! Unified error type for hogkbd.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! `defmt::Format` is derived behind the `defmt` feature so the host
//! test build stays logger-free.

/// Errors raised while bringing up or running a keyboard link.
///
/// Decode-level problems (short reports, rollover) are never errors;
/// they are counted in `DecodeStats` and the pipeline keeps running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HostError {
    /// Every connection slot is taken and none can be recycled.
    ResourceExhausted,

    /// The scan could not be started or aborted unexpectedly.
    ScanFailed,

    /// The peripheral did not complete the connection within the deadline.
    ConnectTimeout,

    /// The SoftDevice rejected or aborted the connection attempt.
    ConnectFailed,

    /// Pairing or encryption failed; the link was dropped on purpose.
    SecurityFailed,

    /// The peripheral exposes no HID service (0x1812).
    HidServiceNotFound,

    /// The HID service has no Input Report accepting notify or indicate.
    NoSubscribableReports,

    /// Writing the CCCD to enable notifications failed.
    SubscribeFailed,

    /// The link dropped outside of a requested disconnect.
    LinkLost,
}
