//! Inbound request models and their validation.
//!
//! Requests arrive as camelCase JSON from the outer dispatch layer. Only the
//! fields the controller routes on are typed here; everything else is opaque
//! to the controller and handed to the slice untouched.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tessera_core::LeasePolicy;

use crate::error::{Error, Result};

/// Pattern a hostname prefix must match in full.
pub const HOST_NAME_PREFIX_PATTERN: &str = "^[a-zA-Z]+$";

/// Counters used by slices to name the instances they create.
///
/// Every fulfillment hands the current counters to the slice and gets the
/// advanced counters back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameIndices {
    /// Index appended to instance names.
    pub name_index: u32,
    /// Index appended to service-provider instance names.
    pub sp_name_index: u32,
}

impl NameIndices {
    /// Creates a counter pair.
    #[must_use]
    pub const fn new(name_index: u32, sp_name_index: u32) -> Self {
        Self {
            name_index,
            sp_name_index,
        }
    }
}

/// Strategy for choosing the slice that services a compute request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum SlicePolicy {
    /// Always allocate a fresh slice.
    New,
    /// Reuse a slice whose lease ends exactly at the requested lease end.
    #[default]
    Default,
    /// Use the slice named in the request.
    Existing,
}

impl SlicePolicy {
    /// Returns the wire name of the policy.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Default => "default",
            Self::Existing => "existing",
        }
    }
}

impl fmt::Display for SlicePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SlicePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" => Ok(Self::New),
            "default" => Ok(Self::Default),
            "existing" => Ok(Self::Existing),
            _ => Err(Error::bad_request(format!("unsupported slice policy: {s}"))),
        }
    }
}

impl TryFrom<String> for SlicePolicy {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// A validated lease window in epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaseWindow {
    /// Lease start.
    pub start: i64,
    /// Lease end.
    pub end: i64,
}

impl LeaseWindow {
    /// Resolves and validates a requested lease window.
    ///
    /// The lease end is mandatory; the start defaults to `now`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadRequest`] when the end is missing or the window
    /// violates `policy`.
    pub fn resolve(
        start: Option<i64>,
        end: Option<i64>,
        policy: &LeasePolicy,
        is_future: bool,
        now: i64,
    ) -> Result<Self> {
        let end = end.ok_or_else(|| Error::bad_request("no lease end time specified"))?;
        let start = start.unwrap_or(now);
        policy.validate(start, end, is_future, now)?;
        Ok(Self { start, end })
    }
}

/// Request for compute instances.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeRequest {
    /// Number of CPUs.
    pub cpus: u32,
    /// RAM per CPU in MB.
    #[serde(default)]
    pub ram_per_cpu: u32,
    /// Disk per CPU in GB.
    #[serde(default)]
    pub disk_per_cpu: u32,
    /// Number of GPUs.
    #[serde(default)]
    pub gpus: u32,
    /// Whether all CPUs must land on a single instance.
    #[serde(default)]
    pub coallocate: bool,
    /// Fixed IP address for the instance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    /// Prefix for generated hostnames.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_name_prefix: Option<String>,
    /// Lease start in epoch seconds.
    #[serde(
        default,
        with = "epoch_seconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub lease_start: Option<i64>,
    /// Lease end in epoch seconds.
    #[serde(
        default,
        with = "epoch_seconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub lease_end: Option<i64>,
    /// Slice selection strategy.
    #[serde(default)]
    pub slice_policy: SlicePolicy,
    /// Slice to use with [`SlicePolicy::Existing`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slice_name: Option<String>,
    /// Fields consumed by the slice only (image, post-boot script, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ComputeRequest {
    /// Validates the request and fills in the lease start when omitted.
    ///
    /// Lease bounds relative to `now` are not checked for future requests.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadRequest`] for the first failing rule.
    pub fn validate(&mut self, policy: &LeasePolicy, is_future: bool, now: i64) -> Result<()> {
        if self.gpus > 0 {
            return Err(Error::bad_request("this region does not support GPUs"));
        }

        if let Some(ip) = self.ip_address.as_deref() {
            if !self.coallocate {
                return Err(Error::bad_request(
                    "IP address can only be specified with coallocate=true",
                ));
            }
            if ip.parse::<IpAddr>().is_err() {
                return Err(Error::bad_request(format!("not a valid IP address: {ip}")));
            }
        }

        if let Some(prefix) = self.host_name_prefix.as_deref() {
            if !host_name_prefix_pattern()?.is_match(prefix) {
                return Err(Error::bad_request(
                    "host name prefix can only contain alphabet characters",
                ));
            }
        }

        let window = LeaseWindow::resolve(self.lease_start, self.lease_end, policy, is_future, now)?;
        self.lease_start = Some(window.start);
        Ok(())
    }
}

/// Request to attach storage to an existing instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageRequest {
    /// Hostname of the instance the storage attaches to.
    pub target: String,
    /// Lease start in epoch seconds.
    #[serde(
        default,
        with = "epoch_seconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub lease_start: Option<i64>,
    /// Lease end in epoch seconds.
    #[serde(
        default,
        with = "epoch_seconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub lease_end: Option<i64>,
    /// Volume size in GB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    /// Mount point on the target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_point: Option<String>,
    /// Storage action (add, delete, renew).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl StorageRequest {
    /// Validates the lease bounds and fills in the lease start when omitted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadRequest`] when the lease window is invalid.
    pub fn validate(&mut self, policy: &LeasePolicy, is_future: bool, now: i64) -> Result<()> {
        let window = LeaseWindow::resolve(self.lease_start, self.lease_end, policy, is_future, now)?;
        self.lease_start = Some(window.start);
        Ok(())
    }
}

/// Request to stitch an instance to an external network.
///
/// Stitches attach to an existing lease, so no lease validation applies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StitchRequest {
    /// Hostname of the instance to stitch.
    pub target: String,
    /// Stitch port URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    /// VLAN tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// IP assigned on the stitched interface.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stitch_ip: Option<String>,
    /// Bandwidth in bits per second.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bandwidth: Option<String>,
}

fn host_name_prefix_pattern() -> Result<&'static Regex> {
    static PATTERN: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(HOST_NAME_PREFIX_PATTERN))
        .as_ref()
        .map_err(|e| Error::internal(format!("invalid host name prefix pattern: {e}")))
}

/// Accepts epoch seconds either as an integer or as its decimal string form.
mod epoch_seconds {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Str(String),
    }

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(value: &Option<i64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(secs) => serializer.serialize_some(&secs.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
        match Option::<Raw>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Raw::Int(secs)) => Ok(Some(secs)),
            Some(Raw::Str(s)) => s
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|e| D::Error::custom(format!("epoch seconds expected, got {s:?}: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn compute(lease_end: i64) -> ComputeRequest {
        ComputeRequest {
            cpus: 4,
            lease_end: Some(lease_end),
            ..ComputeRequest::default()
        }
    }

    #[test]
    fn gpus_are_rejected() {
        let mut request = compute(NOW + 3600);
        request.gpus = 1;
        let err = request
            .validate(&LeasePolicy::default(), false, NOW)
            .unwrap_err();
        assert!(err.is_bad_request());
    }

    #[test]
    fn ip_requires_coallocation() {
        let mut request = compute(NOW + 3600);
        request.ip_address = Some("172.16.0.10".to_string());
        assert!(
            request
                .validate(&LeasePolicy::default(), false, NOW)
                .unwrap_err()
                .is_bad_request()
        );

        request.coallocate = true;
        assert!(request.validate(&LeasePolicy::default(), false, NOW).is_ok());
    }

    #[test]
    fn ipv6_literal_is_accepted_and_garbage_rejected() {
        let mut request = compute(NOW + 3600);
        request.coallocate = true;
        request.ip_address = Some("fe80::1".to_string());
        assert!(request.validate(&LeasePolicy::default(), false, NOW).is_ok());

        request.ip_address = Some("300.1.1.1".to_string());
        assert!(request.validate(&LeasePolicy::default(), false, NOW).is_err());
    }

    #[test]
    fn host_name_prefix_must_be_alphabetic() {
        let mut request = compute(NOW + 3600);
        request.host_name_prefix = Some("worker".to_string());
        assert!(request.validate(&LeasePolicy::default(), false, NOW).is_ok());

        for bad in ["worker1", "work-er", ""] {
            request.host_name_prefix = Some(bad.to_string());
            assert!(
                request.validate(&LeasePolicy::default(), false, NOW).is_err(),
                "prefix {bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn lease_end_is_mandatory_and_start_defaults_to_now() {
        let mut request = ComputeRequest {
            cpus: 1,
            ..ComputeRequest::default()
        };
        let err = request
            .validate(&LeasePolicy::default(), false, NOW)
            .unwrap_err();
        assert!(err.to_string().contains("lease end"));

        request.lease_end = Some(NOW + 60);
        request
            .validate(&LeasePolicy::default(), false, NOW)
            .unwrap();
        assert_eq!(request.lease_start, Some(NOW));
    }

    #[test]
    fn slice_policy_parsing() {
        assert_eq!("NEW".parse::<SlicePolicy>().unwrap(), SlicePolicy::New);
        assert_eq!(
            "Existing".parse::<SlicePolicy>().unwrap(),
            SlicePolicy::Existing
        );
        assert!("RANDOM".parse::<SlicePolicy>().unwrap_err().is_bad_request());
    }

    #[test]
    fn compute_request_accepts_wire_shape() {
        let request: ComputeRequest = serde_json::from_value(serde_json::json!({
            "cpus": 2,
            "ramPerCpu": 4096,
            "diskPerCpu": 10,
            "gpus": 0,
            "coallocate": true,
            "ipAddress": "10.0.0.5",
            "hostNamePrefix": "master",
            "leaseStart": "1700000000",
            "leaseEnd": 1_700_003_600_i64,
            "slicePolicy": "existing",
            "sliceName": "slice-a",
            "imageName": "centos-7"
        }))
        .unwrap();

        assert_eq!(request.lease_start, Some(1_700_000_000));
        assert_eq!(request.lease_end, Some(1_700_003_600));
        assert_eq!(request.slice_policy, SlicePolicy::Existing);
        assert_eq!(request.slice_name.as_deref(), Some("slice-a"));
        assert_eq!(
            request.extra.get("imageName"),
            Some(&serde_json::json!("centos-7"))
        );
    }

    #[test]
    fn unknown_slice_policy_fails_deserialization() {
        let result: std::result::Result<ComputeRequest, _> =
            serde_json::from_value(serde_json::json!({"cpus": 1, "slicePolicy": "cheapest"}));
        assert!(result.is_err());
    }

    #[test]
    fn storage_request_validates_lease() {
        let mut request = StorageRequest {
            target: "worker-0".to_string(),
            lease_end: Some(NOW - 10),
            ..StorageRequest::default()
        };
        assert!(request.validate(&LeasePolicy::default(), false, NOW).is_err());

        request.lease_end = Some(NOW + 600);
        request.validate(&LeasePolicy::default(), false, NOW).unwrap();
        assert_eq!(request.lease_start, Some(NOW));
    }
}
