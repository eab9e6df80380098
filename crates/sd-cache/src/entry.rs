//! Entry framing shared by the store implementations.
//!
//! Each stored value is prefixed with its expiry time:
//!
//! ```text
//! [expires_at: u64 LE, seconds since UNIX epoch][data bytes]
//! ```

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Size of the expiry header in bytes.
pub(crate) const HEADER_LEN: usize = 8;

/// Compute the expiry timestamp for an entry written now.
pub(crate) fn expiry_from_now(ttl: Duration) -> u64 {
    now_secs().saturating_add(ttl.as_secs())
}

/// Current time in seconds since the UNIX epoch.
pub(crate) fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

/// Whether an entry with the given expiry is still live.
pub(crate) fn is_live(expires_at: u64) -> bool {
    now_secs() < expires_at
}

/// Frame `value` with its expiry header.
pub(crate) fn encode(expires_at: u64, value: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + value.len());
    buf.extend_from_slice(&expires_at.to_le_bytes());
    buf.extend_from_slice(value);
    buf
}

/// Split a framed record into expiry and data.
///
/// Returns `None` if the record is shorter than the header.
pub(crate) fn decode(record: &[u8]) -> Option<(u64, &[u8])> {
    let (header, data) = record.split_at_checked(HEADER_LEN)?;
    let expires_at = u64::from_le_bytes(header.try_into().ok()?);
    Some((expires_at, data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        let record = encode(42, b"payload");
        assert_eq!(decode(&record), Some((42, &b"payload"[..])));
    }

    #[test]
    fn test_decode_truncated_header() {
        assert_eq!(decode(&[1, 2, 3]), None);
    }

    #[test]
    fn test_expiry_saturates() {
        assert_eq!(expiry_from_now(Duration::from_secs(u64::MAX)), u64::MAX);
    }

    #[test]
    fn test_zero_ttl_is_not_live() {
        assert!(!is_live(expiry_from_now(Duration::ZERO)));
    }
}
