//! # tessera-region
//!
//! Per-region slice lifecycle controller for the Tessera provisioning
//! orchestrator.
//!
//! A workflow spans several regions. In each region, one
//! [`RegionController`] owns the slices allocated on behalf of the workflow
//! and provides:
//!
//! - **Request Routing**: Compute requests land on a fresh or reused slice
//!   according to their [`SlicePolicy`]; storage and stitch requests follow
//!   the hostname of their target instance
//! - **Failure Containment**: A slice that reports not-found-or-dead is purged
//!   from every index before the failing call returns
//! - **Reconciliation**: A periodic pass rebuilds the derived indices and
//!   folds per-slice status into one [`RegionReport`]
//! - **Persistence**: Owned slices export to a compact snapshot and reattach
//!   on restore
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use tessera_core::RegionConfig;
//! use tessera_region::flavor::FixedFlavors;
//! use tessera_region::request::{ComputeRequest, NameIndices, StorageRequest};
//! use tessera_region::slice::memory::InMemorySliceFactory;
//! use tessera_region::RegionController;
//!
//! # tokio_test::block_on(async {
//! let controller = RegionController::new(
//!     RegionConfig::new("RENCI", "workflow-42"),
//!     Arc::new(InMemorySliceFactory::new()),
//!     Arc::new(FixedFlavors::default()),
//! );
//!
//! let lease_end = chrono::Utc::now().timestamp() + 3600;
//! let compute = ComputeRequest {
//!     cpus: 2,
//!     lease_end: Some(lease_end),
//!     ..ComputeRequest::default()
//! };
//! let next = controller
//!     .process_compute(compute, NameIndices::default(), false)
//!     .await?;
//! assert_eq!(next.name_index, 1);
//!
//! // The first reconciliation makes worker0 routable.
//! controller.do_periodic().await;
//! let storage = StorageRequest {
//!     target: "worker0".to_string(),
//!     lease_end: Some(lease_end),
//!     ..StorageRequest::default()
//! };
//! controller.process_storage(storage, 0, false).await?;
//! # Ok::<(), tessera_region::Error>(())
//! # }).unwrap();
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod controller;
pub mod error;
pub mod flavor;
pub mod index;
pub mod metrics;
pub mod request;
pub mod slice;
pub mod snapshot;

pub use controller::{RegionController, RegionReport};
pub use error::{Error, Result};
pub use request::{ComputeRequest, NameIndices, SlicePolicy, StitchRequest, StorageRequest};
pub use slice::{Slice, SliceError, SliceFactory, SliceStatus};
pub use snapshot::{RegionSnapshot, SliceRecord};
