//! # tessera-core
//!
//! Core abstractions shared by the Tessera provisioning controllers.
//!
//! This crate provides the foundational pieces every controller builds on:
//!
//! - **Error Types**: Shared error definitions and result types
//! - **Configuration**: Environment-driven controller configuration
//! - **Lease Policy**: The shared lease-window validation rule
//! - **Time Helpers**: Epoch-second and epoch-millisecond conversions
//! - **Observability**: Logging initialization and span constructors
//!
//! ## Example
//!
//! ```rust
//! use tessera_core::prelude::*;
//!
//! let policy = LeasePolicy::default();
//! let now = chrono::Utc::now().timestamp();
//! assert!(policy.validate(now, now + 3600, false, now).is_ok());
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod lease;
pub mod observability;
pub mod time;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use tessera_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::RegionConfig;
    pub use crate::error::{Error, Result};
    pub use crate::lease::LeasePolicy;
    pub use crate::observability::{LogFormat, init_logging, region_span};
}

pub use config::RegionConfig;
pub use error::{Error, Result};
pub use lease::LeasePolicy;
pub use observability::{LogFormat, init_logging, region_span};
