//! Epoch time conversions.
//!
//! Requests carry lease bounds as epoch seconds while slice expiries are
//! persisted as epoch-millisecond strings. These helpers keep both encodings
//! in one place.

use chrono::{DateTime, TimeZone, Utc};

use crate::error::{Error, Result};

/// Returns the current time as epoch seconds.
#[must_use]
pub fn now_epoch_seconds() -> i64 {
    Utc::now().timestamp()
}

/// Converts epoch seconds into a UTC timestamp.
///
/// Returns `None` when the value is outside the representable range.
#[must_use]
pub fn from_epoch_seconds(seconds: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(seconds, 0).single()
}

/// Formats a timestamp as an epoch-millisecond integer string.
#[must_use]
pub fn to_epoch_millis_string(at: DateTime<Utc>) -> String {
    at.timestamp_millis().to_string()
}

/// Parses an epoch-millisecond integer string into a UTC timestamp.
///
/// # Errors
///
/// Returns [`Error::Serialization`] if the string is not an integer or is out of range.
pub fn parse_epoch_millis(value: &str) -> Result<DateTime<Utc>> {
    let millis = value.trim().parse::<i64>().map_err(|e| {
        Error::serialization(format!("expiry must be epoch milliseconds ({value}): {e}"))
    })?;
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| Error::serialization(format!("expiry out of range: {value}")))
}
