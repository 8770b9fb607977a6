//! Advertisement payload parsing.
//!
//! An advertisement is a run of AD structures: `[len][type][payload]`,
//! where `len` counts the type byte plus the payload. The walk stops at
//! the first structure that would run past the buffer.

const AD_TYPE_UUID16_INCOMPLETE: u8 = 0x02;
const AD_TYPE_UUID16_COMPLETE: u8 = 0x03;
const AD_TYPE_NAME_SHORTENED: u8 = 0x08;
const AD_TYPE_NAME_COMPLETE: u8 = 0x09;
const AD_TYPE_APPEARANCE: u8 = 0x19;

/// Iterate over the `(type, payload)` pairs of an advertisement.
fn ad_structures(data: &[u8]) -> impl Iterator<Item = (u8, &[u8])> {
    let mut i = 0;
    core::iter::from_fn(move || {
        if i >= data.len() {
            return None;
        }
        let len = data[i] as usize;
        if len == 0 || i + len >= data.len() {
            return None;
        }
        let ad_type = data[i + 1];
        let payload = &data[i + 2..i + 1 + len];
        i += len + 1;
        Some((ad_type, payload))
    })
}

/// Check whether a 16-bit service UUID list advertises `uuid`.
///
/// Looks at both the complete and the incomplete list; keyboards that
/// advertise sparsely often only ship the incomplete one.
pub fn contains_service_uuid16(data: &[u8], uuid: u16) -> bool {
    let needle = uuid.to_le_bytes();
    ad_structures(data).any(|(ad_type, payload)| {
        (ad_type == AD_TYPE_UUID16_INCOMPLETE || ad_type == AD_TYPE_UUID16_COMPLETE)
            && payload.chunks_exact(2).any(|chunk| chunk == needle)
    })
}

/// Extract the GAP appearance value (AD type 0x19), if advertised.
pub fn extract_appearance(data: &[u8]) -> Option<u16> {
    ad_structures(data).find_map(|(ad_type, payload)| {
        if ad_type == AD_TYPE_APPEARANCE && payload.len() >= 2 {
            Some(u16::from_le_bytes([payload[0], payload[1]]))
        } else {
            None
        }
    })
}

/// Extract the complete/shortened local name, borrowed from the
/// advertisement buffer. Absent or non-UTF-8 names yield `None`; the
/// caller decides on a placeholder.
pub fn extract_name(data: &[u8]) -> Option<&str> {
    ad_structures(data).find_map(|(ad_type, payload)| {
        if ad_type == AD_TYPE_NAME_SHORTENED || ad_type == AD_TYPE_NAME_COMPLETE {
            core::str::from_utf8(payload).ok()
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_uuid_in_complete_list() {
        // len=3, type=0x03 (complete 16-bit UUID list), 0x1812 LE.
        let data = [0x03, 0x03, 0x12, 0x18];
        assert!(contains_service_uuid16(&data, 0x1812));
    }

    #[test]
    fn finds_uuid_in_incomplete_list() {
        let data = [0x03, 0x02, 0x12, 0x18];
        assert!(contains_service_uuid16(&data, 0x1812));
    }

    #[test]
    fn finds_uuid_among_several() {
        // Battery service (0x180F) first, HID second.
        let data = [0x05, 0x03, 0x0F, 0x18, 0x12, 0x18];
        assert!(contains_service_uuid16(&data, 0x1812));
        assert!(contains_service_uuid16(&data, 0x180F));
    }

    #[test]
    fn rejects_other_uuids() {
        let data = [0x03, 0x03, 0x0F, 0x18];
        assert!(!contains_service_uuid16(&data, 0x1812));
    }

    #[test]
    fn ignores_uuid_bytes_outside_uuid_structures() {
        // 0x1812 LE inside a manufacturer-data structure must not match.
        let data = [0x04, 0xFF, 0x12, 0x18, 0x00];
        assert!(!contains_service_uuid16(&data, 0x1812));
    }

    #[test]
    fn handles_empty_and_truncated_payloads() {
        assert!(!contains_service_uuid16(&[], 0x1812));
        // len runs past the end of the buffer.
        assert!(!contains_service_uuid16(&[0x09, 0x03, 0x12], 0x1812));
        assert_eq!(extract_appearance(&[0x09, 0x19, 0xC1]), None);
    }

    #[test]
    fn extracts_appearance() {
        // Appearance 0x03C1 (keyboard), LE.
        let data = [0x03, 0x19, 0xC1, 0x03];
        assert_eq!(extract_appearance(&data), Some(0x03C1));
    }

    #[test]
    fn appearance_absent() {
        let data = [0x03, 0x03, 0x12, 0x18];
        assert_eq!(extract_appearance(&data), None);
    }

    #[test]
    fn extracts_complete_name() {
        // "KBD" as complete local name.
        let data = [0x04, 0x09, b'K', b'B', b'D'];
        assert_eq!(extract_name(&data), Some("KBD"));
    }

    #[test]
    fn extracts_shortened_name() {
        let data = [0x03, 0x08, b'K', b'B'];
        assert_eq!(extract_name(&data), Some("KB"));
    }

    #[test]
    fn missing_name_is_none() {
        let data = [0x03, 0x19, 0xC1, 0x03];
        assert_eq!(extract_name(&data), None);
    }

    #[test]
    fn non_utf8_name_is_skipped() {
        // A broken shortened name followed by a valid complete one.
        let data = [0x03, 0x08, 0xFF, 0xFE, 0x03, 0x09, b'K', b'B'];
        assert_eq!(extract_name(&data), Some("KB"));
    }
}
