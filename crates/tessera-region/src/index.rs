//! Derived indices over the controller's slice collection.
//!
//! Both indices are views of the primary `name -> slice` map. They are
//! rebuilt from scratch on every reconciliation and patched in between:
//! inserts after a successful allocation, removals on purge.
//!
//! Removal by slice name is ASCII case-insensitive, so a purge also clears
//! entries recorded under a differently cased spelling of the same name.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, Utc};

/// Set-valued map from exact lease end to the slices whose lease ends then.
///
/// Lookups use exact timestamp equality; there is no tolerance window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeaseIndex {
    by_expiry: BTreeMap<DateTime<Utc>, BTreeSet<String>>,
}

impl LeaseIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `name`'s lease ends at `expiry`.
    pub fn insert(&mut self, expiry: DateTime<Utc>, name: impl Into<String>) {
        self.by_expiry.entry(expiry).or_default().insert(name.into());
    }

    /// Returns a slice whose lease ends exactly at `expiry`.
    ///
    /// When several slices share the instant, the lexicographically first
    /// name is returned.
    #[must_use]
    pub fn find(&self, expiry: &DateTime<Utc>) -> Option<&str> {
        self.by_expiry
            .get(expiry)
            .and_then(|names| names.iter().next())
            .map(String::as_str)
    }

    /// Returns every slice whose lease ends exactly at `expiry`.
    pub fn names_at(&self, expiry: &DateTime<Utc>) -> impl Iterator<Item = &str> {
        self.by_expiry
            .get(expiry)
            .into_iter()
            .flat_map(|names| names.iter().map(String::as_str))
    }

    /// Removes `name` from every expiry bucket, dropping emptied buckets.
    ///
    /// Returns the number of entries removed.
    pub fn remove_slice(&mut self, name: &str) -> usize {
        let mut removed = 0;
        self.by_expiry.retain(|_, names| {
            let before = names.len();
            names.retain(|n| !n.eq_ignore_ascii_case(name));
            removed += before - names.len();
            !names.is_empty()
        });
        removed
    }

    /// Returns true if any bucket references `name`.
    #[must_use]
    pub fn references(&self, name: &str) -> bool {
        self.by_expiry
            .values()
            .flatten()
            .any(|n| n.eq_ignore_ascii_case(name))
    }

    /// Iterates `(expiry, name)` entries in expiry order.
    pub fn iter(&self) -> impl Iterator<Item = (&DateTime<Utc>, &str)> {
        self.by_expiry
            .iter()
            .flat_map(|(expiry, names)| names.iter().map(move |n| (expiry, n.as_str())))
    }

    /// Returns the total number of entries across all buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_expiry.values().map(BTreeSet::len).sum()
    }

    /// Returns true if the index has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_expiry.is_empty()
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.by_expiry.clear();
    }
}

/// Hostname routing index plus the set of hostnames reported live.
///
/// Authoritative only right after a reconciliation pass; between passes a
/// hostname of a slice that just died may still resolve.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostnameIndex {
    owners: BTreeMap<String, String>,
    live: HashSet<String>,
}

impl HostnameIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `hostname` to `slice` unless another slice already claimed it.
    ///
    /// Returns true if the binding was made.
    pub fn bind(&mut self, hostname: &str, slice: &str) -> bool {
        if self.owners.contains_key(hostname) {
            return false;
        }
        self.owners.insert(hostname.to_string(), slice.to_string());
        true
    }

    /// Adds hostnames to the live set.
    pub fn mark_live<I>(&mut self, hostnames: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.live.extend(hostnames);
    }

    /// Returns the slice owning `hostname`.
    #[must_use]
    pub fn owner(&self, hostname: &str) -> Option<&str> {
        self.owners.get(hostname).map(String::as_str)
    }

    /// Returns the hostnames reported live by the last reconciliation.
    #[must_use]
    pub fn live(&self) -> &HashSet<String> {
        &self.live
    }

    /// Returns the hostname-to-slice bindings.
    #[must_use]
    pub fn owners(&self) -> &BTreeMap<String, String> {
        &self.owners
    }

    /// Removes every binding owned by `slice`.
    ///
    /// Returns the number of bindings removed.
    pub fn remove_slice(&mut self, slice: &str) -> usize {
        let before = self.owners.len();
        self.owners.retain(|_, owner| !owner.eq_ignore_ascii_case(slice));
        before - self.owners.len()
    }

    /// Returns true if any hostname is bound to `slice`.
    #[must_use]
    pub fn references(&self, slice: &str) -> bool {
        self.owners
            .values()
            .any(|owner| owner.eq_ignore_ascii_case(slice))
    }

    /// Removes every binding and live hostname.
    pub fn clear(&mut self) {
        self.owners.clear();
        self.live.clear();
    }
}
