//! Durable snapshot shapes.
//!
//! The controller persists one record per slice so a restarted controller can
//! reattach to the slices it owned. Only names and lease ends are stored; the
//! hostname and lease indices are rebuilt by the first reconciliation after a
//! restore.
//!
//! ```json
//! [
//!   { "name": "slice-a", "expiry": "1700003600000" },
//!   { "name": "slice-b" }
//! ]
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tessera_core::time::{parse_epoch_millis, to_epoch_millis_string};

use crate::error::Result;

/// Persisted form of one slice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceRecord {
    /// Slice name.
    pub name: String,
    /// Lease end as an epoch-millisecond integer string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<String>,
}

impl SliceRecord {
    /// Creates a record for a slice.
    #[must_use]
    pub fn new(name: impl Into<String>, expiry: Option<DateTime<Utc>>) -> Self {
        Self {
            name: name.into(),
            expiry: expiry.map(to_epoch_millis_string),
        }
    }

    /// Decodes the persisted lease end.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the expiry is not epoch milliseconds.
    pub fn expiry_time(&self) -> Result<Option<DateTime<Utc>>> {
        self.expiry
            .as_deref()
            .map(parse_epoch_millis)
            .transpose()
            .map_err(Into::into)
    }
}

/// Whole-context snapshot stored by the outer orchestration layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionSnapshot {
    /// Region identity.
    pub site: String,
    /// Workflow the region provisions for.
    pub workflow_id: String,
    /// Slice records; absent when the region owns no slices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slices: Option<Vec<SliceRecord>>,
}
