//! Timestamps are stored as UNIX seconds.

use chrono::{DateTime, TimeZone, Utc};

use crate::error::StorageError;

/// Converts a timestamp to UNIX seconds.
pub fn to_unix(time: DateTime<Utc>) -> i64 {
    time.timestamp()
}

/// Converts stored UNIX seconds back to a timestamp.
pub fn from_unix(seconds: i64) -> Result<DateTime<Utc>, StorageError> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| StorageError::Corrupt(format!("timestamp out of range: {seconds}")))
}

/// Current time truncated to whole seconds, matching stored precision.
pub fn now() -> DateTime<Utc> {
    let now = Utc::now();
    Utc.timestamp_opt(now.timestamp(), 0).single().unwrap_or(now)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_roundtrip() {
        let time = now();
        assert_eq!(from_unix(to_unix(time)).unwrap(), time);
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(from_unix(i64::MAX).is_err());
    }
}
