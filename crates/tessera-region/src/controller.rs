//! The per-region slice controller.
//!
//! [`RegionController`] owns every slice it allocated in one region together
//! with two derived indices:
//!
//! - a lease index (exact lease end -> slice names) used by
//!   [`SlicePolicy::Default`] to pack requests with the same lease into one
//!   slice
//! - a hostname index (hostname -> slice name) used to route storage and
//!   stitch requests to the slice owning the target host
//!
//! All state sits behind one async lock held for the whole of each public
//! operation, including the awaited slice call. A slice that reports
//! not-found-or-dead during any operation is purged from both indices and
//! dropped before the operation returns.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tessera_core::observability::region_span;
use tessera_core::time::{from_epoch_seconds, now_epoch_seconds};
use tessera_core::RegionConfig;
use tokio::sync::Mutex;
use tracing::{Instrument, debug, error, info, warn};

use crate::error::{Error, Result, slice_label};
use crate::flavor::{ComputeShape, FlavorSelector};
use crate::index::{HostnameIndex, LeaseIndex};
use crate::metrics::{RegionMetrics, TimingGuard};
use crate::request::{ComputeRequest, NameIndices, SlicePolicy, StitchRequest, StorageRequest};
use crate::slice::{Slice, SliceError, SliceFactory, SliceStatus};
use crate::snapshot::{RegionSnapshot, SliceRecord};

/// Aggregate status of one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionReport {
    /// Region identity.
    pub site: String,
    /// Non-empty per-slice status objects, in slice name order.
    pub slices: Vec<SliceStatus>,
}

/// Mutable controller state guarded by the region lock.
#[derive(Default)]
struct RegionState {
    slices: BTreeMap<String, Box<dyn Slice>>,
    leases: LeaseIndex,
    hostnames: HostnameIndex,
    notify_pending: bool,
}

impl RegionState {
    /// Drops every derived index entry that refers to `name`.
    ///
    /// The primary map is left alone; callers remove the slice themselves.
    fn purge(&mut self, name: &str) {
        let hosts = self.hostnames.remove_slice(name);
        let leases = self.leases.remove_slice(name);
        debug!(slice = %name, hosts, leases, "purged slice from indices");
    }

    /// Purges `name` and removes the slice object.
    fn drop_slice(&mut self, name: &str) {
        self.purge(name);
        self.slices.remove(name);
    }

    fn restore(&mut self, records: &[SliceRecord], factory: &dyn SliceFactory) {
        for record in records {
            if self.slices.contains_key(&record.name) {
                warn!(slice = %record.name, "slice already owned, skipping restore record");
                continue;
            }

            let mut slice = factory.attach(&record.name);
            match record.expiry_time() {
                Ok(Some(expiry)) => slice.set_expiry(expiry),
                Ok(None) => {}
                Err(err) => {
                    warn!(
                        slice = %record.name,
                        error = %err,
                        "unreadable slice expiry, restoring without it"
                    );
                }
            }
            self.slices.insert(record.name.clone(), slice);
        }
    }
}

/// Controller for the slices of one region.
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
///
/// use tessera_core::RegionConfig;
/// use tessera_region::flavor::FixedFlavors;
/// use tessera_region::slice::memory::InMemorySliceFactory;
/// use tessera_region::RegionController;
///
/// # tokio_test::block_on(async {
/// let controller = RegionController::new(
///     RegionConfig::new("RENCI", "workflow-42"),
///     Arc::new(InMemorySliceFactory::new()),
///     Arc::new(FixedFlavors::default()),
/// );
/// assert_eq!(controller.slice_count().await, 0);
/// assert!(controller.do_periodic().await.is_none());
/// # });
/// ```
pub struct RegionController {
    config: RegionConfig,
    factory: Arc<dyn SliceFactory>,
    flavors: Arc<dyn FlavorSelector>,
    metrics: RegionMetrics,
    state: Mutex<RegionState>,
}

impl fmt::Debug for RegionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegionController")
            .field("site", &self.config.site)
            .field("workflow_id", &self.config.workflow_id)
            .finish_non_exhaustive()
    }
}

impl RegionController {
    /// Creates a controller that owns no slices.
    #[must_use]
    pub fn new(
        config: RegionConfig,
        factory: Arc<dyn SliceFactory>,
        flavors: Arc<dyn FlavorSelector>,
    ) -> Self {
        let metrics = RegionMetrics::new(config.site.clone());
        Self {
            config,
            factory,
            flavors,
            metrics,
            state: Mutex::new(RegionState::default()),
        }
    }

    /// Rehydrates a controller from a stored snapshot.
    ///
    /// Indices stay empty until the first [`RegionController::do_periodic`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadRequest`] if the snapshot belongs to another site
    /// or workflow.
    pub fn from_snapshot(
        config: RegionConfig,
        factory: Arc<dyn SliceFactory>,
        flavors: Arc<dyn FlavorSelector>,
        snapshot: &RegionSnapshot,
    ) -> Result<Self> {
        if snapshot.site != config.site || snapshot.workflow_id != config.workflow_id {
            return Err(Error::bad_request(format!(
                "snapshot of {}/{} cannot restore region {}/{}",
                snapshot.site, snapshot.workflow_id, config.site, config.workflow_id
            )));
        }

        let mut state = RegionState::default();
        if let Some(records) = snapshot.slices.as_deref() {
            state.restore(records, factory.as_ref());
        }
        let controller = Self::new(config, factory, flavors);
        controller.metrics.set_slices(state.slices.len());
        Ok(Self {
            state: Mutex::new(state),
            ..controller
        })
    }

    /// Returns the region configuration.
    #[must_use]
    pub fn context(&self) -> &RegionConfig {
        &self.config
    }

    fn span(&self, operation: &str) -> tracing::Span {
        region_span(operation, &self.config.site, &self.config.workflow_id)
    }

    /// Provisions compute on a new or reused slice.
    ///
    /// Returns the name counters advanced by the slice.
    ///
    /// # Errors
    ///
    /// - [`Error::BadRequest`] if the request fails validation or no flavor
    ///   fits its shape
    /// - [`Error::NotFound`] if an [`SlicePolicy::Existing`] slice is unknown
    /// - [`Error::SliceNotFound`] if the slice reported itself gone; it has
    ///   been purged
    /// - [`Error::Slice`] for any other slice failure
    pub async fn process_compute(
        &self,
        request: ComputeRequest,
        indices: NameIndices,
        is_future: bool,
    ) -> Result<NameIndices> {
        let result = self
            .compute(request, indices, is_future)
            .instrument(self.span("process_compute"))
            .await;
        self.metrics.record_request("compute", outcome(&result));
        result
    }

    async fn compute(
        &self,
        mut request: ComputeRequest,
        indices: NameIndices,
        is_future: bool,
    ) -> Result<NameIndices> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        request.validate(&self.config.lease_policy, is_future, now_epoch_seconds())?;

        let flavors = self
            .flavors
            .select(&ComputeShape::from(&request))
            .filter(|flavors| !flavors.is_empty())
            .ok_or_else(|| Error::bad_request("no flavor satisfies the compute request"))?;

        let reuse = match request.slice_policy {
            SlicePolicy::New => None,
            SlicePolicy::Default => request
                .lease_end
                .and_then(from_epoch_seconds)
                .and_then(|end| state.leases.find(&end))
                .map(str::to_string),
            SlicePolicy::Existing => Some(request.slice_name.clone().ok_or_else(|| {
                Error::bad_request("a slice name is required with the existing slice policy")
            })?),
        };

        if let Some(name) = reuse {
            let Some(slice) = state.slices.get_mut(&name) else {
                return Err(Error::not_found(format!("slice context not found: {name}")));
            };
            debug!(slice = %name, policy = %request.slice_policy, "reusing slice");
            let result = slice.fulfill_compute(&flavors, indices, &request).await;
            return result.map_err(|err| self.contain(state, Some(&name), err, "process_compute"));
        }

        let mut slice = self.factory.create();
        let result = slice.fulfill_compute(&flavors, indices, &request).await;
        let next = match result {
            Ok(next) => next,
            Err(err) => {
                let name = slice.name().map(str::to_string);
                return Err(self.contain(state, name.as_deref(), err, "process_compute"));
            }
        };

        let Some(name) = slice.name().map(str::to_string) else {
            release(slice.as_mut()).await;
            return Err(Error::internal("slice allocated without a name"));
        };
        if state.slices.contains_key(&name) {
            release(slice.as_mut()).await;
            return Err(Error::internal(format!("slice name already owned: {name}")));
        }
        if let Some(expiry) = slice.expiry() {
            state.leases.insert(expiry, name.clone());
        }
        state.slices.insert(name.clone(), slice);
        self.metrics.set_slices(state.slices.len());
        info!(slice = %name, "allocated slice");
        Ok(next)
    }

    /// Attaches storage to the host named by `request.target`.
    ///
    /// Returns the name index advanced by the slice.
    ///
    /// # Errors
    ///
    /// - [`Error::BadRequest`] if the lease window is invalid
    /// - [`Error::NotFound`] if no slice owns the target host
    /// - [`Error::SliceNotFound`] if the slice reported itself gone
    /// - [`Error::Slice`] for any other slice failure
    pub async fn process_storage(
        &self,
        request: StorageRequest,
        name_index: u32,
        is_future: bool,
    ) -> Result<u32> {
        let result = self
            .storage(request, name_index, is_future)
            .instrument(self.span("process_storage"))
            .await;
        self.metrics.record_request("storage", outcome(&result));
        result
    }

    async fn storage(
        &self,
        mut request: StorageRequest,
        name_index: u32,
        is_future: bool,
    ) -> Result<u32> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        request.validate(&self.config.lease_policy, is_future, now_epoch_seconds())?;

        let name = route(state, &request.target)?;
        let Some(slice) = state.slices.get_mut(&name) else {
            return Err(Error::not_found(format!("slice context not found: {name}")));
        };
        let result = slice.fulfill_storage(&request, name_index).await;
        result.map_err(|err| self.contain(state, Some(&name), err, "process_storage"))
    }

    /// Stitches the host named by `request.target` to an external network.
    ///
    /// `is_future` is accepted for symmetry; stitches carry no lease.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if no slice owns the target host
    /// - [`Error::SliceNotFound`] if the slice reported itself gone
    /// - [`Error::Slice`] for any other slice failure
    pub async fn process_stitch(
        &self,
        request: StitchRequest,
        name_index: u32,
        is_future: bool,
    ) -> Result<u32> {
        let result = self
            .stitch(request, name_index, is_future)
            .instrument(self.span("process_stitch"))
            .await;
        self.metrics.record_request("stitch", outcome(&result));
        result
    }

    async fn stitch(&self, request: StitchRequest, name_index: u32, is_future: bool) -> Result<u32> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let name = route(state, &request.target)?;
        let Some(slice) = state.slices.get_mut(&name) else {
            return Err(Error::not_found(format!("slice context not found: {name}")));
        };
        debug!(slice = %name, target = %request.target, is_future, "stitching");
        let result = slice.fulfill_stitch(&request, name_index).await;
        result.map_err(|err| self.contain(state, Some(&name), err, "process_stitch"))
    }

    /// Turns a slice failure into a request error.
    ///
    /// A not-found-or-dead slice is purged and dropped first.
    fn contain(
        &self,
        state: &mut RegionState,
        name: Option<&str>,
        err: SliceError,
        source: &'static str,
    ) -> Error {
        let slice = slice_label(name);
        if !err.is_not_found_or_dead() {
            warn!(slice = %slice, error = %err, "slice operation failed");
            return Error::Slice { slice, source: err };
        }

        warn!(slice = %slice, error = %err, "slice is gone, purging");
        if let Some(name) = name {
            state.drop_slice(name);
        }
        self.metrics.record_purge(source);
        self.metrics.set_slices(state.slices.len());
        Error::SliceNotFound { slice }
    }

    /// Runs one reconciliation pass.
    ///
    /// Both indices are rebuilt from the slices that are still alive. Returns
    /// the status deltas gathered from the slices, or `None` when no slice had
    /// anything to report.
    pub async fn do_periodic(&self) -> Option<RegionReport> {
        let _timer = TimingGuard::new(|elapsed| self.metrics.observe_reconcile(elapsed));
        self.reconcile().instrument(self.span("do_periodic")).await
    }

    async fn reconcile(&self) -> Option<RegionReport> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        state.hostnames.clear();
        state.leases.clear();

        let names: Vec<String> = state.slices.keys().cloned().collect();
        let mut deltas = Vec::new();
        for name in names {
            let Some(slice) = state.slices.get_mut(&name) else {
                continue;
            };

            let mut hostnames = HashSet::new();
            let result = slice.do_periodic(&mut hostnames).await;
            let delta = match result {
                Ok(delta) => delta,
                Err(err) if err.is_not_found_or_dead() => {
                    warn!(slice = %name, error = %err, "slice is gone, dropping");
                    state.drop_slice(&name);
                    self.metrics.record_purge("do_periodic");
                    continue;
                }
                Err(err) => {
                    warn!(slice = %name, error = %err, "periodic refresh failed, keeping slice");
                    continue;
                }
            };

            for hostname in &hostnames {
                if !state.hostnames.bind(hostname, &name) {
                    debug!(%hostname, slice = %name, "hostname already claimed");
                }
            }
            state.hostnames.mark_live(hostnames);

            if let Some(expiry) = slice.expiry() {
                state.leases.insert(expiry, name.clone());
            }

            if slice.can_notify() {
                state.notify_pending = true;
                slice.clear_notify();
            }

            if let Some(delta) = delta.filter(|delta| !delta.is_empty()) {
                deltas.push(delta);
            }
        }

        self.metrics.set_slices(state.slices.len());
        debug!(
            slices = state.slices.len(),
            hostnames = state.hostnames.owners().len(),
            deltas = deltas.len(),
            "reconciled"
        );
        self.report(deltas)
    }

    /// Collects status from every slice for the hosts reported live by the
    /// last reconciliation.
    pub async fn status(&self) -> Option<RegionReport> {
        async {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;

            let names: Vec<String> = state.slices.keys().cloned().collect();
            let mut statuses = Vec::new();
            for name in names {
                let Some(slice) = state.slices.get_mut(&name) else {
                    continue;
                };
                let result = slice.status(state.hostnames.live()).await;
                match result {
                    Ok(status) if !status.is_empty() => statuses.push(status),
                    Ok(_) => {}
                    Err(err) if err.is_not_found_or_dead() => {
                        warn!(slice = %name, error = %err, "slice is gone, dropping");
                        state.drop_slice(&name);
                        self.metrics.record_purge("status");
                    }
                    Err(err) => {
                        warn!(slice = %name, error = %err, "status failed, keeping slice");
                    }
                }
            }
            self.metrics.set_slices(state.slices.len());
            self.report(statuses)
        }
        .instrument(self.span("status"))
        .await
    }

    fn report(&self, slices: Vec<SliceStatus>) -> Option<RegionReport> {
        if slices.is_empty() {
            return None;
        }
        Some(RegionReport {
            site: self.config.site.clone(),
            slices,
        })
    }

    /// Tears down every slice and forgets them.
    ///
    /// A slice that fails to stop is logged and dropped anyway.
    pub async fn stop(&self) {
        async {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;

            for (name, slice) in &mut state.slices {
                match slice.stop().await {
                    Ok(()) => info!(slice = %name, "stopped slice"),
                    Err(err) => error!(slice = %name, error = %err, "failed to stop slice"),
                }
            }
            state.slices.clear();
            state.leases.clear();
            state.hostnames.clear();
            self.metrics.set_slices(0);
        }
        .instrument(self.span("stop"))
        .await;
    }

    /// Returns one record per owned slice, or `None` when there are none.
    pub async fn export(&self) -> Option<Vec<SliceRecord>> {
        let state = self.state.lock().await;
        if state.slices.is_empty() {
            return None;
        }
        Some(
            state
                .slices
                .iter()
                .map(|(name, slice)| SliceRecord::new(name.clone(), slice.expiry()))
                .collect(),
        )
    }

    /// Returns [`RegionController::export`] as a JSON array.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if the records cannot be encoded.
    pub async fn export_json(&self) -> Result<Option<serde_json::Value>> {
        self.export()
            .await
            .map(|records| {
                serde_json::to_value(records).map_err(|e| Error::Serialization {
                    message: format!("failed to encode slice records: {e}"),
                })
            })
            .transpose()
    }

    /// Reattaches the slices described by `records`.
    ///
    /// Indices are rebuilt by the next reconciliation.
    pub async fn restore(&self, records: Option<&[SliceRecord]>) {
        let span = self.span("restore");
        async {
            let Some(records) = records else {
                error!("no slice records to restore");
                return;
            };
            let mut state = self.state.lock().await;
            state.restore(records, self.factory.as_ref());
            self.metrics.set_slices(state.slices.len());
            info!(slices = state.slices.len(), "restored slices");
        }
        .instrument(span)
        .await;
    }

    /// Reattaches slices from the JSON form produced by
    /// [`RegionController::export_json`].
    ///
    /// Malformed elements are skipped.
    pub async fn restore_json(&self, value: Option<&serde_json::Value>) {
        let records = match value {
            None => None,
            Some(serde_json::Value::Array(items)) => Some(
                items
                    .iter()
                    .filter_map(|item| match SliceRecord::deserialize(item) {
                        Ok(record) => Some(record),
                        Err(err) => {
                            warn!(error = %err, "skipping malformed slice record");
                            None
                        }
                    })
                    .collect::<Vec<_>>(),
            ),
            Some(other) => {
                error!(kind = json_kind(other), "slice records are not an array");
                return;
            }
        };
        self.restore(records.as_deref()).await;
    }

    /// Builds the whole-region snapshot stored by the orchestration layer.
    pub async fn snapshot(&self) -> RegionSnapshot {
        RegionSnapshot {
            site: self.config.site.clone(),
            workflow_id: self.config.workflow_id.clone(),
            slices: self.export().await,
        }
    }

    /// Returns true if a slice named `name` is owned.
    pub async fn contains_slice(&self, name: &str) -> bool {
        self.state.lock().await.slices.contains_key(name)
    }

    /// Returns the number of owned slices.
    pub async fn slice_count(&self) -> usize {
        self.state.lock().await.slices.len()
    }

    /// Returns the owned slice names in order.
    pub async fn slice_names(&self) -> Vec<String> {
        self.state.lock().await.slices.keys().cloned().collect()
    }

    /// Returns the slice that owns `hostname`.
    pub async fn slice_for_hostname(&self, hostname: &str) -> Option<String> {
        self.state
            .lock()
            .await
            .hostnames
            .owner(hostname)
            .map(str::to_string)
    }

    /// Returns a copy of the hostname bindings, for aggregation across regions.
    pub async fn hostname_index(&self) -> BTreeMap<String, String> {
        self.state.lock().await.hostnames.owners().clone()
    }

    /// Returns the hostnames reported live by the last reconciliation.
    pub async fn live_hostnames(&self) -> HashSet<String> {
        self.state.lock().await.hostnames.live().clone()
    }

    /// Returns a copy of the lease index.
    pub async fn lease_index(&self) -> LeaseIndex {
        self.state.lock().await.leases.clone()
    }

    /// Returns true if a reconciliation saw a slice with news since the flag
    /// was last cleared.
    pub async fn needs_notification(&self) -> bool {
        self.state.lock().await.notify_pending
    }

    /// Clears the aggregate notification flag.
    pub async fn clear_notification(&self) {
        self.state.lock().await.notify_pending = false;
    }
}

/// Tears down a provisioned slice the controller refuses to own.
async fn release(slice: &mut dyn Slice) {
    let label = slice_label(slice.name());
    match slice.stop().await {
        Ok(()) => warn!(slice = %label, "released rejected slice"),
        Err(err) => error!(slice = %label, error = %err, "failed to stop rejected slice"),
    }
}

fn route(state: &RegionState, hostname: &str) -> Result<String> {
    state
        .hostnames
        .owner(hostname)
        .map(str::to_string)
        .ok_or_else(|| Error::not_found(format!("hostname not found: {hostname}")))
}

fn outcome<T>(result: &Result<T>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(Error::BadRequest { .. }) => "bad_request",
        Err(Error::NotFound { .. }) => "not_found",
        Err(Error::SliceNotFound { .. }) => "slice_gone",
        Err(_) => "error",
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use tessera_core::LeasePolicy;

    use super::*;
    use crate::flavor::FixedFlavors;
    use crate::slice::memory::{InMemorySliceFactory, SliceControl};

    fn controller() -> (RegionController, SliceControl) {
        let factory = InMemorySliceFactory::new();
        let control = factory.control();
        let controller = RegionController::new(
            RegionConfig::new("RENCI", "wf-1"),
            Arc::new(factory),
            Arc::new(FixedFlavors::default()),
        );
        (controller, control)
    }

    fn compute(lease_end: i64) -> ComputeRequest {
        ComputeRequest {
            cpus: 1,
            lease_end: Some(lease_end),
            ..ComputeRequest::default()
        }
    }

    fn tomorrow() -> i64 {
        now_epoch_seconds() + 86_400
    }

    #[tokio::test]
    async fn new_slice_is_indexed_by_lease_end() -> Result<()> {
        let (controller, control) = controller();
        control.queue_name("slice-a");
        let end = tomorrow();

        let next = controller
            .process_compute(compute(end), NameIndices::new(0, 0), false)
            .await?;

        assert_eq!(next, NameIndices::new(1, 0));
        assert!(controller.contains_slice("slice-a").await);
        let leases = controller.lease_index().await;
        assert_eq!(leases.find(&from_epoch_seconds(end).unwrap()), Some("slice-a"));
        Ok(())
    }

    #[tokio::test]
    async fn validation_failure_leaves_state_untouched() {
        let (controller, _) = controller();
        let request = ComputeRequest {
            gpus: 1,
            ..compute(tomorrow())
        };

        let err = controller
            .process_compute(request, NameIndices::default(), false)
            .await
            .unwrap_err();

        assert!(err.is_bad_request());
        assert_eq!(controller.slice_count().await, 0);
    }

    #[tokio::test]
    async fn lease_policy_from_config_is_applied() {
        let factory = InMemorySliceFactory::new();
        let mut config = RegionConfig::new("RENCI", "wf-1");
        config.lease_policy = LeasePolicy::default().with_max_duration(Duration::hours(1));
        let controller = RegionController::new(
            config,
            Arc::new(factory),
            Arc::new(FixedFlavors::default()),
        );

        let err = controller
            .process_compute(compute(tomorrow()), NameIndices::default(), true)
            .await
            .unwrap_err();
        assert!(err.is_bad_request());
    }

    #[tokio::test]
    async fn refused_flavor_is_a_bad_request() {
        let factory = InMemorySliceFactory::new();
        let controller = RegionController::new(
            RegionConfig::new("RENCI", "wf-1"),
            Arc::new(factory),
            Arc::new(FixedFlavors::default().with_max_cpus(2)),
        );
        let request = ComputeRequest {
            cpus: 8,
            ..compute(tomorrow())
        };

        let err = controller
            .process_compute(request, NameIndices::default(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest { ref message } if message.contains("flavor")));
    }

    #[tokio::test]
    async fn existing_policy_requires_name() {
        let (controller, _) = controller();
        let request = ComputeRequest {
            slice_policy: SlicePolicy::Existing,
            ..compute(tomorrow())
        };

        let err = controller
            .process_compute(request, NameIndices::default(), false)
            .await
            .unwrap_err();
        assert!(err.is_bad_request());
    }

    #[tokio::test]
    async fn stop_clears_everything() -> Result<()> {
        let (controller, control) = controller();
        control.queue_name("slice-a");
        controller
            .process_compute(compute(tomorrow()), NameIndices::default(), false)
            .await?;
        controller.do_periodic().await;

        controller.stop().await;

        assert_eq!(controller.slice_count().await, 0);
        assert!(controller.hostname_index().await.is_empty());
        assert!(controller.lease_index().await.is_empty());
        assert_eq!(control.stopped(), vec!["slice-a".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn restore_json_skips_malformed_elements() {
        let (controller, _) = controller();
        let value = serde_json::json!([
            {"name": "slice-a", "expiry": "1700003600000"},
            {"expiry": "1700003600000"},
            {"name": "slice-b"}
        ]);

        controller.restore_json(Some(&value)).await;

        assert_eq!(
            controller.slice_names().await,
            vec!["slice-a".to_string(), "slice-b".to_string()]
        );
    }

    #[tokio::test]
    async fn restore_json_ignores_non_array() {
        let (controller, _) = controller();
        controller
            .restore_json(Some(&serde_json::json!({"name": "slice-a"})))
            .await;
        assert_eq!(controller.slice_count().await, 0);
    }

    /// Provisions successfully but never reports a name.
    #[derive(Debug)]
    struct NamelessSlice {
        stopped: Arc<std::sync::atomic::AtomicBool>,
    }

    #[async_trait::async_trait]
    impl Slice for NamelessSlice {
        fn name(&self) -> Option<&str> {
            None
        }

        fn expiry(&self) -> Option<chrono::DateTime<chrono::Utc>> {
            None
        }

        fn set_expiry(&mut self, _expiry: chrono::DateTime<chrono::Utc>) {}

        fn can_notify(&self) -> bool {
            false
        }

        fn clear_notify(&mut self) {}

        async fn fulfill_compute(
            &mut self,
            _flavors: &[String],
            indices: NameIndices,
            _request: &ComputeRequest,
        ) -> crate::slice::SliceResult<NameIndices> {
            Ok(indices)
        }

        async fn fulfill_storage(
            &mut self,
            _request: &StorageRequest,
            name_index: u32,
        ) -> crate::slice::SliceResult<u32> {
            Ok(name_index)
        }

        async fn fulfill_stitch(
            &mut self,
            _request: &StitchRequest,
            name_index: u32,
        ) -> crate::slice::SliceResult<u32> {
            Ok(name_index)
        }

        async fn status(
            &mut self,
            _live_hostnames: &HashSet<String>,
        ) -> crate::slice::SliceResult<SliceStatus> {
            Ok(SliceStatus::new())
        }

        async fn do_periodic(
            &mut self,
            _hostnames: &mut HashSet<String>,
        ) -> crate::slice::SliceResult<Option<SliceStatus>> {
            Ok(None)
        }

        async fn stop(&mut self) -> crate::slice::SliceResult<()> {
            self.stopped.store(true, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
    }

    struct NamelessFactory {
        stopped: Arc<std::sync::atomic::AtomicBool>,
    }

    impl SliceFactory for NamelessFactory {
        fn create(&self) -> Box<dyn Slice> {
            Box::new(NamelessSlice {
                stopped: self.stopped.clone(),
            })
        }

        fn attach(&self, _name: &str) -> Box<dyn Slice> {
            self.create()
        }
    }

    #[tokio::test]
    async fn nameless_slice_is_stopped_and_not_inserted() {
        let stopped = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let controller = RegionController::new(
            RegionConfig::new("RENCI", "wf-1"),
            Arc::new(NamelessFactory {
                stopped: stopped.clone(),
            }),
            Arc::new(FixedFlavors::default()),
        );

        let err = controller
            .process_compute(compute(tomorrow()), NameIndices::default(), false)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Internal { .. }));
        assert!(stopped.load(std::sync::atomic::Ordering::SeqCst));
        assert_eq!(controller.slice_count().await, 0);
        assert!(controller.lease_index().await.is_empty());
    }

    #[test]
    fn outcome_labels_follow_error_kind() {
        assert_eq!(outcome(&Ok::<_, Error>(())), "ok");
        assert_eq!(outcome::<()>(&Err(Error::bad_request("x"))), "bad_request");
        assert_eq!(outcome::<()>(&Err(Error::not_found("x"))), "not_found");
        assert_eq!(
            outcome::<()>(&Err(Error::SliceNotFound {
                slice: "slice-a".to_string()
            })),
            "slice_gone"
        );
        assert_eq!(outcome::<()>(&Err(Error::internal("x"))), "error");
    }
}
