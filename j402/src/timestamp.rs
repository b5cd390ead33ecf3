//! Unix timestamp type for payment authorization windows.
//!
//! Authorizations are time-bounded: `validAfter` marks the earliest moment a
//! payment may be executed and `validBefore` the latest. Both serialize as
//! stringified integers, since JSON consumers cannot represent all 64-bit
//! values losslessly as numbers.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::Add;
use std::time::SystemTime;

/// Seconds since the Unix epoch, string-serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnixTimestamp(u64);

impl UnixTimestamp {
    /// The epoch itself; used as `validAfter` for immediately-valid authorizations.
    pub const ZERO: Self = Self(0);

    /// Creates a timestamp from a raw seconds value.
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    /// Returns the current system time.
    ///
    /// # Panics
    ///
    /// Panics if the system clock is set before the Unix epoch.
    #[must_use]
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .expect("system clock before UNIX epoch")
            .as_secs();
        Self(secs)
    }

    /// Returns the raw seconds value.
    #[must_use]
    pub const fn as_secs(&self) -> u64 {
        self.0
    }
}

impl Add<u64> for UnixTimestamp {
    type Output = Self;

    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0.saturating_add(rhs))
    }
}

impl fmt::Display for UnixTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for UnixTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for UnixTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse::<u64>()
            .map(Self)
            .map_err(|_| serde::de::Error::custom("timestamp must be a non-negative integer"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_as_string() {
        let ts = UnixTimestamp::from_secs(1_700_000_000);
        assert_eq!(serde_json::to_string(&ts).unwrap(), "\"1700000000\"");
    }

    #[test]
    fn test_roundtrip() {
        let ts = UnixTimestamp::from_secs(42);
        let json = serde_json::to_string(&ts).unwrap();
        let back: UnixTimestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(ts, back);
    }

    #[test]
    fn test_rejects_non_numeric() {
        assert!(serde_json::from_str::<UnixTimestamp>("\"soon\"").is_err());
    }

    #[test]
    fn test_add_saturates() {
        let ts = UnixTimestamp::from_secs(u64::MAX) + 10;
        assert_eq!(ts.as_secs(), u64::MAX);
    }
}
