//! Shared lease-window validation.
//!
//! Every controller validates requested lease bounds with the same rule so a
//! request accepted by one region is never rejected by a sibling for timing
//! reasons alone.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default tolerance for a lease start that lies in the past.
pub const DEFAULT_MAX_START_SKEW_SECS: i64 = 300;

/// Lease-window validation rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeasePolicy {
    /// How far in the past a non-future lease may start.
    #[serde(with = "duration_secs")]
    pub max_start_skew: Duration,
    /// Longest lease window accepted, if bounded.
    #[serde(default, with = "option_duration_secs")]
    pub max_duration: Option<Duration>,
}

impl Default for LeasePolicy {
    fn default() -> Self {
        Self {
            max_start_skew: Duration::seconds(DEFAULT_MAX_START_SKEW_SECS),
            max_duration: None,
        }
    }
}

impl LeasePolicy {
    /// Creates a policy with the given start skew and no duration bound.
    #[must_use]
    pub const fn new(max_start_skew: Duration) -> Self {
        Self {
            max_start_skew,
            max_duration: None,
        }
    }

    /// Bounds the lease window length.
    #[must_use]
    pub const fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = Some(max_duration);
        self
    }

    /// Validates a lease window given as epoch seconds.
    ///
    /// Future requests are deferred by the caller, so only the ordering and
    /// length checks apply to them; the bounds relative to `now` are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] describing the first violated bound.
    pub fn validate(&self, start: i64, end: i64, is_future: bool, now: i64) -> Result<()> {
        if end <= start {
            return Err(Error::InvalidInput(format!(
                "lease end ({end}) must be after lease start ({start})"
            )));
        }

        if let Some(max) = self.max_duration {
            // Overflow means the window is wider than any representable maximum.
            let within = end
                .checked_sub(start)
                .is_some_and(|length| length <= max.num_seconds());
            if !within {
                return Err(Error::InvalidInput(format!(
                    "lease window from {start} to {end} exceeds the maximum of {}s",
                    max.num_seconds()
                )));
            }
        }

        if is_future {
            return Ok(());
        }

        if start < now.saturating_sub(self.max_start_skew.num_seconds()) {
            return Err(Error::InvalidInput(format!(
                "lease start ({start}) is too far in the past"
            )));
        }
        if end <= now {
            return Err(Error::InvalidInput(format!(
                "lease end ({end}) is already in the past"
            )));
        }

        Ok(())
    }
}

fn try_seconds<E: serde::de::Error>(secs: i64) -> std::result::Result<Duration, E> {
    Duration::try_seconds(secs)
        .ok_or_else(|| E::custom(format!("duration of {secs}s is out of range")))
}

mod duration_secs {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(value.num_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        super::try_seconds(i64::deserialize(deserializer)?)
    }
}

mod option_duration_secs {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_some(&duration.num_seconds()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<i64>::deserialize(deserializer)?
            .map(super::try_seconds)
            .transpose()
    }
}
