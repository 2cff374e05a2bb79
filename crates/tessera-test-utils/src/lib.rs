//! Shared test utilities for Tessera integration tests.
//!
//! This crate provides:
//! - [`TestRegion`]: A controller wired to in-memory slices
//! - Request builders with leases that pass validation
//! - Assertion helpers for the controller's index invariants
//!
//! # Example
//!
//! ```rust,ignore
//! use tessera_test_utils::{TestRegion, compute_request, assert_indices_consistent};
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let region = TestRegion::new();
//!     region.control.queue_name("slice-a");
//!     // ... run test ...
//!     assert_indices_consistent(&region.controller).await;
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
// Test utilities use expect/unwrap for cleaner test code - panics are acceptable in tests
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]

pub mod assertions;
pub mod fixtures;

pub use assertions::*;
pub use fixtures::*;

/// Initialize test logging (call once per test module).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("tessera=debug".parse().expect("valid directive")),
        )
        .with_test_writer()
        .try_init();
}
