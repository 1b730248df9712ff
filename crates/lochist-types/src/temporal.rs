use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Wall-clock timestamp of a snapshot, in milliseconds since the UNIX epoch.
///
/// Snapshot ordering never depends on timestamps alone (the commit log is
/// authoritative); timestamps exist for display and for age-based queries.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Create a timestamp from explicit milliseconds.
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// The current wall-clock time.
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self(millis)
    }

    /// The zero timestamp.
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Milliseconds since the UNIX epoch.
    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Whole seconds since the UNIX epoch.
    pub fn as_secs(&self) -> i64 {
        (self.0 / 1000) as i64
    }

    /// Returns `true` if this timestamp is strictly after `other`.
    pub fn is_after(&self, other: &Self) -> bool {
        self > other
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({}ms)", self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_produces_reasonable_timestamp() {
        // After 2020-01-01.
        assert!(Timestamp::now().as_millis() > 1_577_836_800_000);
    }

    #[test]
    fn zero_is_smallest() {
        assert!(Timestamp::zero() < Timestamp::from_millis(1));
    }

    #[test]
    fn seconds_truncate() {
        assert_eq!(Timestamp::from_millis(2_999).as_secs(), 2);
    }

    #[test]
    fn ordering() {
        let a = Timestamp::from_millis(100);
        let b = Timestamp::from_millis(200);
        assert!(b.is_after(&a));
        assert!(!a.is_after(&a));
    }

    #[test]
    fn serializes_as_plain_number() {
        let json = serde_json::to_string(&Timestamp::from_millis(42)).unwrap();
        assert_eq!(json, "42");
    }
}
