//! Pre-built test fixtures for common test scenarios.
//!
//! Provides factory functions to create requests and controllers with
//! sensible defaults.

use std::sync::Arc;

use tessera_core::RegionConfig;
use tessera_core::time::now_epoch_seconds;
use tessera_region::flavor::FixedFlavors;
use tessera_region::slice::memory::{InMemorySliceFactory, SliceControl};
use tessera_region::{ComputeRequest, RegionController, SlicePolicy, StitchRequest, StorageRequest};

/// Site used by [`TestRegion::new`].
pub const TEST_SITE: &str = "RENCI (Chapel Hill, NC USA)";

/// Workflow used by [`TestRegion::new`].
pub const TEST_WORKFLOW: &str = "test-workflow";

/// A controller backed by in-memory slices, plus the handle scripting them.
pub struct TestRegion {
    /// The controller under test.
    pub controller: Arc<RegionController>,
    /// Script shared by every slice the controller allocates.
    pub control: SliceControl,
    /// Factory the controller allocates from.
    pub factory: Arc<InMemorySliceFactory>,
}

impl TestRegion {
    /// Creates a region with default configuration and flavors.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RegionConfig::new(TEST_SITE, TEST_WORKFLOW))
    }

    /// Creates a region with a specific configuration.
    #[must_use]
    pub fn with_config(config: RegionConfig) -> Self {
        let factory = Arc::new(InMemorySliceFactory::new());
        let control = factory.control();
        let controller = Arc::new(RegionController::new(
            config,
            factory.clone(),
            Arc::new(FixedFlavors::default()),
        ));
        Self {
            controller,
            control,
            factory,
        }
    }
}

impl Default for TestRegion {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns an epoch-second lease end one day from now.
pub fn lease_end_tomorrow() -> i64 {
    now_epoch_seconds() + 86_400
}

/// Creates a one-CPU compute request with the given lease end and policy.
pub fn compute_request(lease_end: i64, policy: SlicePolicy) -> ComputeRequest {
    ComputeRequest {
        cpus: 1,
        ram_per_cpu: 1024,
        disk_per_cpu: 10,
        lease_end: Some(lease_end),
        slice_policy: policy,
        ..ComputeRequest::default()
    }
}

/// Creates a compute request for an existing slice.
pub fn existing_compute_request(lease_end: i64, slice: &str) -> ComputeRequest {
    ComputeRequest {
        slice_name: Some(slice.to_string()),
        ..compute_request(lease_end, SlicePolicy::Existing)
    }
}

/// Creates a storage request targeting `target`.
pub fn storage_request(target: &str, lease_end: i64) -> StorageRequest {
    StorageRequest {
        target: target.to_string(),
        lease_end: Some(lease_end),
        size: Some(10),
        mount_point: Some("/mnt/data".to_string()),
        action: Some("add".to_string()),
        ..StorageRequest::default()
    }
}

/// Creates a stitch request targeting `target`.
pub fn stitch_request(target: &str) -> StitchRequest {
    StitchRequest {
        target: target.to_string(),
        port: Some("http://geni-orca.renci.org/owl/port#1".to_string()),
        tag: Some("3291".to_string()),
        stitch_ip: Some("172.16.0.1".to_string()),
        bandwidth: Some("1000000000".to_string()),
    }
}
