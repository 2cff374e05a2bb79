//! In-memory slice implementation for testing.
//!
//! This module provides [`InMemorySlice`] and [`InMemorySliceFactory`], simple
//! in-memory implementations of the [`Slice`] and [`SliceFactory`] traits
//! suitable for testing and development.
//!
//! All slices created by one factory share a [`SliceControl`] handle, which
//! lets a test kill a slice, fail its teardown, or override the hostnames it
//! reports.
//!
//! ## Limitations
//!
//! - **NOT suitable for production**: Nothing is provisioned
//! - **One host per compute request**: Shape and flavor are ignored

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use ulid::Ulid;

use super::{Slice, SliceError, SliceFactory, SliceResult, SliceStatus};
use crate::request::{ComputeRequest, NameIndices, StitchRequest, StorageRequest};

/// Default prefix for generated hostnames.
const DEFAULT_HOST_PREFIX: &str = "worker";

/// Fault and naming script shared by every slice of one factory.
#[derive(Debug, Default)]
struct ControlState {
    dead: HashSet<String>,
    fail_next_allocation: Option<String>,
    failing_stops: HashSet<String>,
    reported_hostnames: HashMap<String, Vec<String>>,
    queued_names: VecDeque<String>,
    stopped: Vec<String>,
}

/// Handle for scripting the behavior of in-memory slices.
///
/// Cloning the handle shares the script.
///
/// ## Example
///
/// ```rust
/// use tessera_region::slice::memory::SliceControl;
///
/// let control = SliceControl::new();
/// control.queue_name("slice-a");
/// control.mark_dead("slice-a");
/// assert!(control.is_dead("slice-a"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct SliceControl {
    state: Arc<Mutex<ControlState>>,
}

impl SliceControl {
    /// Creates an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ControlState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes the named slice report not-found-or-dead from now on.
    pub fn mark_dead(&self, name: &str) {
        self.lock().dead.insert(name.to_string());
    }

    /// Undoes [`SliceControl::mark_dead`].
    pub fn revive(&self, name: &str) {
        self.lock().dead.remove(name);
    }

    /// Returns true if the named slice reports not-found-or-dead.
    #[must_use]
    pub fn is_dead(&self, name: &str) -> bool {
        self.lock().dead.contains(name)
    }

    /// Makes the next allocation of a fresh slice report not-found-or-dead.
    ///
    /// The slice is named before it fails, like a provider that accepted the
    /// request and lost the resource right after.
    pub fn fail_next_allocation(&self, reason: impl Into<String>) {
        self.lock().fail_next_allocation = Some(reason.into());
    }

    /// Makes `stop` fail for the named slice.
    pub fn fail_stop(&self, name: &str) {
        self.lock().failing_stops.insert(name.to_string());
    }

    /// Overrides the hostnames the named slice reports during reconciliation.
    pub fn set_reported_hostnames<I, S>(&self, name: &str, hostnames: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock().reported_hostnames.insert(
            name.to_string(),
            hostnames.into_iter().map(Into::into).collect(),
        );
    }

    /// Queues the name given to the next freshly allocated slice.
    ///
    /// Without a queued name, slices are named `slice-<ulid>`.
    pub fn queue_name(&self, name: impl Into<String>) {
        self.lock().queued_names.push_back(name.into());
    }

    /// Returns the names of slices that were stopped successfully, in order.
    #[must_use]
    pub fn stopped(&self) -> Vec<String> {
        self.lock().stopped.clone()
    }

    fn next_name(&self) -> String {
        self.lock()
            .queued_names
            .pop_front()
            .unwrap_or_else(|| format!("slice-{}", Ulid::new().to_string().to_lowercase()))
    }

    fn take_allocation_failure(&self) -> Option<String> {
        self.lock().fail_next_allocation.take()
    }

    fn reported_hostnames(&self, name: &str) -> Option<Vec<String>> {
        self.lock().reported_hostnames.get(name).cloned()
    }

    fn stop_fails(&self, name: &str) -> bool {
        self.lock().failing_stops.contains(name)
    }

    fn record_stop(&self, name: &str) {
        self.lock().stopped.push(name.to_string());
    }
}

/// In-memory slice for testing.
///
/// Each compute request adds one host named `<prefix><name_index>`. The lease
/// end of the first compute request becomes the slice expiry.
#[derive(Debug)]
pub struct InMemorySlice {
    name: Option<String>,
    expiry: Option<DateTime<Utc>>,
    hosts: BTreeSet<String>,
    notify: bool,
    pending: SliceStatus,
    control: SliceControl,
}

impl InMemorySlice {
    /// Creates an unallocated slice.
    #[must_use]
    pub fn new(control: SliceControl) -> Self {
        Self {
            name: None,
            expiry: None,
            hosts: BTreeSet::new(),
            notify: false,
            pending: SliceStatus::new(),
            control,
        }
    }

    /// Creates a slice bound to an existing name.
    #[must_use]
    pub fn named(name: impl Into<String>, control: SliceControl) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new(control)
        }
    }

    /// Returns the hosts provisioned so far.
    #[must_use]
    pub fn hosts(&self) -> &BTreeSet<String> {
        &self.hosts
    }

    fn ensure_alive(&self) -> SliceResult<()> {
        match self.name.as_deref() {
            Some(name) if self.control.is_dead(name) => {
                Err(SliceError::not_found_or_dead(format!("{name} is gone")))
            }
            _ => Ok(()),
        }
    }

    fn ensure_host(&self, target: &str) -> SliceResult<()> {
        if self.hosts.contains(target) {
            Ok(())
        } else {
            Err(SliceError::failed(format!("host {target} is not part of this slice")))
        }
    }

    fn record_event(&mut self, host: &str, event: &str) {
        self.pending.insert(host.to_string(), json!(event));
        self.notify = true;
    }
}

#[async_trait]
impl Slice for InMemorySlice {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expiry
    }

    fn set_expiry(&mut self, expiry: DateTime<Utc>) {
        self.expiry = Some(expiry);
    }

    fn can_notify(&self) -> bool {
        self.notify
    }

    fn clear_notify(&mut self) {
        self.notify = false;
    }

    async fn fulfill_compute(
        &mut self,
        _flavors: &[String],
        indices: NameIndices,
        request: &ComputeRequest,
    ) -> SliceResult<NameIndices> {
        self.ensure_alive()?;

        if self.name.is_none() {
            let name = self.control.next_name();
            self.name = Some(name.clone());
            if let Some(reason) = self.control.take_allocation_failure() {
                return Err(SliceError::not_found_or_dead(format!("{name}: {reason}")));
            }
        }

        if self.expiry.is_none() {
            self.expiry = request
                .lease_end
                .and_then(tessera_core::time::from_epoch_seconds);
        }

        let prefix = request
            .host_name_prefix
            .as_deref()
            .unwrap_or(DEFAULT_HOST_PREFIX);
        let host = format!("{prefix}{}", indices.name_index);
        self.hosts.insert(host.clone());
        self.record_event(&host, "provisioned");

        Ok(NameIndices::new(
            indices.name_index.saturating_add(1),
            indices.sp_name_index,
        ))
    }

    async fn fulfill_storage(
        &mut self,
        request: &StorageRequest,
        name_index: u32,
    ) -> SliceResult<u32> {
        self.ensure_alive()?;
        self.ensure_host(&request.target)?;
        self.record_event(&request.target, "storage-attached");
        Ok(name_index.saturating_add(1))
    }

    async fn fulfill_stitch(&mut self, request: &StitchRequest, name_index: u32) -> SliceResult<u32> {
        self.ensure_alive()?;
        self.ensure_host(&request.target)?;
        self.record_event(&request.target, "stitched");
        Ok(name_index.saturating_add(1))
    }

    async fn status(&mut self, live_hostnames: &HashSet<String>) -> SliceResult<SliceStatus> {
        self.ensure_alive()?;

        let live: Vec<&String> = self
            .hosts
            .iter()
            .filter(|host| live_hostnames.contains(*host))
            .collect();
        let mut status = SliceStatus::new();
        if !live.is_empty() {
            status.insert("slice".to_string(), json!(self.name));
            status.insert("nodes".to_string(), json!(live));
        }
        Ok(status)
    }

    async fn do_periodic(
        &mut self,
        hostnames: &mut HashSet<String>,
    ) -> SliceResult<Option<SliceStatus>> {
        self.ensure_alive()?;

        let reported = self
            .name
            .as_deref()
            .and_then(|name| self.control.reported_hostnames(name));
        match reported {
            Some(reported) => hostnames.extend(reported),
            None => hostnames.extend(self.hosts.iter().cloned()),
        }

        if self.pending.is_empty() {
            return Ok(None);
        }
        let mut delta = std::mem::take(&mut self.pending);
        delta.insert("slice".to_string(), json!(self.name));
        Ok(Some(delta))
    }

    async fn stop(&mut self) -> SliceResult<()> {
        let Some(name) = self.name.clone() else {
            return Ok(());
        };
        if self.control.stop_fails(&name) {
            return Err(SliceError::failed(format!("failed to delete {name}")));
        }
        self.hosts.clear();
        self.control.record_stop(&name);
        Ok(())
    }
}

/// Factory producing [`InMemorySlice`]s that share one [`SliceControl`].
#[derive(Debug, Clone, Default)]
pub struct InMemorySliceFactory {
    control: SliceControl,
}

impl InMemorySliceFactory {
    /// Creates a factory with a fresh control handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the control handle shared by every slice of this factory.
    #[must_use]
    pub fn control(&self) -> SliceControl {
        self.control.clone()
    }
}

impl SliceFactory for InMemorySliceFactory {
    fn create(&self) -> Box<dyn Slice> {
        Box::new(InMemorySlice::new(self.control.clone()))
    }

    fn attach(&self, name: &str) -> Box<dyn Slice> {
        Box::new(InMemorySlice::named(name, self.control.clone()))
    }
}
