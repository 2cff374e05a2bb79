//! Region controller configuration.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::lease::LeasePolicy;
use crate::observability::LogFormat;

/// Configuration for one region controller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegionConfig {
    /// Region identity reported in aggregate status (e.g. `RENCI (Chapel Hill, NC USA)`).
    pub site: String,

    /// Workflow the controller provisions for.
    pub workflow_id: String,

    /// Log output format.
    #[serde(skip)]
    pub log_format: LogFormat,

    /// Shared lease-window validation rule.
    #[serde(default)]
    pub lease_policy: LeasePolicy,
}

impl RegionConfig {
    /// Creates a configuration with default logging and lease policy.
    #[must_use]
    pub fn new(site: impl Into<String>, workflow_id: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            workflow_id: workflow_id.into(),
            log_format: LogFormat::default(),
            lease_policy: LeasePolicy::default(),
        }
    }

    /// Loads configuration from environment variables.
    ///
    /// Reads:
    /// - `TESSERA_SITE` (required)
    /// - `TESSERA_WORKFLOW_ID` (required)
    /// - `TESSERA_LOG_FORMAT` (`json` | `pretty`, default: `pretty`)
    /// - `TESSERA_LEASE_MAX_START_SKEW_SECS` (default: 300)
    /// - `TESSERA_LEASE_MAX_DURATION_SECS` (optional)
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or any variable is
    /// present but cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`RegionConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| non_empty(lookup(name));

        let site = var("TESSERA_SITE")
            .ok_or_else(|| Error::InvalidInput("TESSERA_SITE is required".to_string()))?;
        let workflow_id = var("TESSERA_WORKFLOW_ID")
            .ok_or_else(|| Error::InvalidInput("TESSERA_WORKFLOW_ID is required".to_string()))?;

        let mut config = Self::new(site, workflow_id);

        if let Some(format) = var("TESSERA_LOG_FORMAT") {
            config.log_format = format.parse()?;
        }
        if let Some(skew) = parse_secs("TESSERA_LEASE_MAX_START_SKEW_SECS", var)? {
            config.lease_policy.max_start_skew = skew;
        }
        if let Some(max) = parse_secs("TESSERA_LEASE_MAX_DURATION_SECS", var)? {
            if max <= Duration::zero() {
                return Err(Error::InvalidInput(
                    "TESSERA_LEASE_MAX_DURATION_SECS must be greater than 0".to_string(),
                ));
            }
            config.lease_policy.max_duration = Some(max);
        }

        Ok(config)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn parse_secs<F>(name: &str, var: F) -> Result<Option<Duration>>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(v) = var(name) else {
        return Ok(None);
    };
    v.parse::<u32>()
        .map(|secs| Some(Duration::seconds(i64::from(secs))))
        .map_err(|e| Error::InvalidInput(format!("{name} must be a number of seconds: {e}")))
}
