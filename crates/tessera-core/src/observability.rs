//! Observability infrastructure for Tessera.
//!
//! Structured logging with consistent spans. This module provides the
//! initialization helper and span constructors shared by every controller.

use std::sync::Once;
use tracing::Span;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Filter used when `RUST_LOG` is unset.
const DEFAULT_DIRECTIVES: &str = "warn,tessera_core=info,tessera_region=info";

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

impl std::str::FromStr for LogFormat {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(crate::Error::InvalidInput(format!(
                "log format must be one of: json, pretty (got {other})"
            ))),
        }
    }
}

/// Initializes the logging subsystem.
///
/// Call once at application startup. Safe to call multiple times;
/// subsequent calls are no-ops.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `tessera_region=debug`).
///   Defaults to `info` for the Tessera crates and `warn` elsewhere.
///
/// # Example
///
/// ```rust
/// use tessera_core::observability::{init_logging, LogFormat};
///
/// init_logging(LogFormat::Pretty);
/// ```
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));
        let registry = tracing_subscriber::registry().with(filter);

        // A subscriber installed by the host process wins.
        let _ = match format {
            LogFormat::Json => registry
                .with(fmt::layer().json().with_current_span(true))
                .try_init(),
            LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
        };
    });
}

/// Creates a span for region controller operations.
///
/// # Example
///
/// ```rust
/// use tessera_core::observability::region_span;
///
/// let span = region_span("process_compute", "RENCI", "workflow-42");
/// let _guard = span.enter();
/// // ... do region operation
/// ```
#[must_use]
pub fn region_span(operation: &str, site: &str, workflow_id: &str) -> Span {
    tracing::info_span!(
        "region",
        op = operation,
        site = site,
        workflow_id = workflow_id,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_succeeds() {
        // Should not panic (uses Once internally)
        init_logging(LogFormat::Pretty);
        init_logging(LogFormat::Pretty);
    }

    #[test]
    fn default_directives_are_valid() {
        assert!(EnvFilter::try_new(DEFAULT_DIRECTIVES).is_ok());
    }

    #[test]
    fn test_region_span_creates_span() {
        let span = region_span("do_periodic", "RENCI", "workflow-1");
        let _guard = span.enter();
        tracing::info!("region message");
    }

    #[test]
    fn log_format_parses_case_insensitively() {
        assert_eq!("JSON".parse::<LogFormat>().ok(), Some(LogFormat::Json));
        assert_eq!(" pretty ".parse::<LogFormat>().ok(), Some(LogFormat::Pretty));
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
