//! Slice capability contract.
//!
//! A slice is a named, leased group of resources on one region. The
//! [`Slice`] trait is the only view the controller has of it: provider
//! negotiation and fulfillment details live behind the trait. This separation
//! enables:
//!
//! - **Testing**: Use [`memory::InMemorySlice`] and make it report
//!   not-found-or-dead on demand
//! - **Production**: Back the trait with the provider's negotiation client
//! - **Flexibility**: Swap providers without changing routing or reconciliation
//!
//! ## Failure Signal
//!
//! Every fulfillment, status and periodic call may return
//! [`SliceError::NotFoundOrDead`]. The controller treats that signal as final:
//! the slice is purged from every index and dropped.

pub mod memory;

use std::collections::HashSet;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::request::{ComputeRequest, NameIndices, StitchRequest, StorageRequest};

/// Per-slice status object reported upstream.
///
/// An empty object means the slice has nothing to report.
pub type SliceStatus = serde_json::Map<String, serde_json::Value>;

/// The result type for slice operations.
pub type SliceResult<T> = std::result::Result<T, SliceError>;

/// Errors raised by a slice.
#[derive(Debug, thiserror::Error)]
pub enum SliceError {
    /// The underlying resource no longer exists or is unusable.
    #[error("slice not found or dead: {reason}")]
    NotFoundOrDead {
        /// Why the slice is considered gone.
        reason: String,
    },

    /// The operation failed but the slice is still alive.
    #[error("slice operation failed: {message}")]
    Failed {
        /// Description of the failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl SliceError {
    /// Creates a not-found-or-dead signal.
    #[must_use]
    pub fn not_found_or_dead(reason: impl Into<String>) -> Self {
        Self::NotFoundOrDead {
            reason: reason.into(),
        }
    }

    /// Creates a failure that leaves the slice alive.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a failure with an underlying cause.
    #[must_use]
    pub fn failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Failed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns true if the slice reported itself gone.
    #[must_use]
    pub const fn is_not_found_or_dead(&self) -> bool {
        matches!(self, Self::NotFoundOrDead { .. })
    }
}

/// A leased resource group the controller allocates, reuses and tears down.
///
/// The controller calls every method while holding its lock, so a slow
/// implementation stalls the whole region. Implementations must bound their
/// own latency.
#[async_trait]
pub trait Slice: Send + Sync + fmt::Debug {
    /// Returns the slice name, or `None` until the resource is allocated.
    ///
    /// Once set, the name never changes.
    fn name(&self) -> Option<&str>;

    /// Returns the lease end, once known.
    fn expiry(&self) -> Option<DateTime<Utc>>;

    /// Records the lease end.
    fn set_expiry(&mut self, expiry: DateTime<Utc>);

    /// Returns true if the slice has state worth notifying upstream.
    fn can_notify(&self) -> bool;

    /// Consumes the pending notification.
    fn clear_notify(&mut self);

    /// Provisions compute using one of the candidate `flavors`.
    ///
    /// Returns the advanced name counters.
    async fn fulfill_compute(
        &mut self,
        flavors: &[String],
        indices: NameIndices,
        request: &ComputeRequest,
    ) -> SliceResult<NameIndices>;

    /// Attaches storage to the request's target host.
    ///
    /// Returns the advanced name index.
    async fn fulfill_storage(&mut self, request: &StorageRequest, name_index: u32)
    -> SliceResult<u32>;

    /// Stitches the request's target host to an external network.
    ///
    /// Returns the advanced name index.
    async fn fulfill_stitch(&mut self, request: &StitchRequest, name_index: u32) -> SliceResult<u32>;

    /// Reports status for the hosts in `live_hostnames`.
    async fn status(&mut self, live_hostnames: &HashSet<String>) -> SliceResult<SliceStatus>;

    /// Refreshes the slice, adding its live hostnames to `hostnames`.
    ///
    /// Returns the status delta since the previous call, if any.
    async fn do_periodic(&mut self, hostnames: &mut HashSet<String>)
    -> SliceResult<Option<SliceStatus>>;

    /// Releases every resource held by the slice.
    async fn stop(&mut self) -> SliceResult<()>;
}

/// Constructs slices for the controller.
pub trait SliceFactory: Send + Sync {
    /// Creates a slice that has not been allocated yet.
    fn create(&self) -> Box<dyn Slice>;

    /// Binds a slice to an already allocated resource, used on restore.
    fn attach(&self, name: &str) -> Box<dyn Slice>;
}
