//! Flavor selection seam.
//!
//! Turning a resource shape into candidate machine flavors is owned by the
//! provider integration. The controller only needs a non-empty candidate list
//! or a refusal.

use crate::request::ComputeRequest;

/// Resource shape of a compute request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputeShape {
    /// Number of CPUs.
    pub cpus: u32,
    /// RAM per CPU in MB.
    pub ram_per_cpu: u32,
    /// Disk per CPU in GB.
    pub disk_per_cpu: u32,
    /// Whether all CPUs must land on a single instance.
    pub coallocate: bool,
}

impl From<&ComputeRequest> for ComputeShape {
    fn from(request: &ComputeRequest) -> Self {
        Self {
            cpus: request.cpus,
            ram_per_cpu: request.ram_per_cpu,
            disk_per_cpu: request.disk_per_cpu,
            coallocate: request.coallocate,
        }
    }
}

/// Chooses candidate machine flavors for a compute shape.
pub trait FlavorSelector: Send + Sync {
    /// Returns candidate flavors, or `None` when no flavor fits the shape.
    fn select(&self, shape: &ComputeShape) -> Option<Vec<String>>;
}

/// Selector that offers the same flavor list for every shape up to a CPU limit.
///
/// Intended for tests and development.
#[derive(Debug, Clone)]
pub struct FixedFlavors {
    flavors: Vec<String>,
    max_cpus: u32,
}

impl FixedFlavors {
    /// Creates a selector offering `flavors` for any shape.
    #[must_use]
    pub fn new<I, S>(flavors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            flavors: flavors.into_iter().map(Into::into).collect(),
            max_cpus: u32::MAX,
        }
    }

    /// Refuses shapes asking for more than `max_cpus` CPUs.
    #[must_use]
    pub const fn with_max_cpus(mut self, max_cpus: u32) -> Self {
        self.max_cpus = max_cpus;
        self
    }
}

impl Default for FixedFlavors {
    fn default() -> Self {
        Self::new(["XOSmall", "XOMedium", "XOLarge"])
    }
}

impl FlavorSelector for FixedFlavors {
    fn select(&self, shape: &ComputeShape) -> Option<Vec<String>> {
        if shape.cpus > self.max_cpus || self.flavors.is_empty() {
            return None;
        }
        Some(self.flavors.clone())
    }
}
