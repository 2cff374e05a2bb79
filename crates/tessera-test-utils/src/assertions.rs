//! Custom assertion helpers for integration tests.

use tessera_region::RegionController;

/// Asserts that neither derived index refers to a slice the controller does
/// not own.
///
/// # Panics
///
/// Panics if a hostname binding or lease entry names an unknown slice.
pub async fn assert_indices_consistent(controller: &RegionController) {
    let names = controller.slice_names().await;

    for (hostname, owner) in controller.hostname_index().await {
        assert!(
            names.contains(&owner),
            "Hostname {hostname} is bound to unknown slice {owner}, owned: {names:?}"
        );
    }

    let leases = controller.lease_index().await;
    for (expiry, name) in leases.iter() {
        assert!(
            names.iter().any(|n| n == name),
            "Lease entry at {expiry} refers to unknown slice {name}, owned: {names:?}"
        );
    }
}

/// Asserts that the controller owns exactly `expected`, in order.
///
/// # Panics
///
/// Panics if the owned slice names differ.
pub async fn assert_slices(controller: &RegionController, expected: &[&str]) {
    let names = controller.slice_names().await;
    assert_eq!(
        names, expected,
        "Expected slices {expected:?}, but owned {names:?}"
    );
}
