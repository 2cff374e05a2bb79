//! Integration tests for snapshot export and restore.

use std::sync::Arc;

use tessera_core::RegionConfig;
use tessera_region::flavor::FixedFlavors;
use tessera_region::{NameIndices, RegionController, SlicePolicy, SliceRecord};
use tessera_test_utils::{
    TEST_SITE, TEST_WORKFLOW, TestRegion, assert_slices, compute_request, lease_end_tomorrow,
};

fn records() -> Vec<SliceRecord> {
    vec![
        SliceRecord {
            name: "slice-a".to_string(),
            expiry: Some("1700003600000".to_string()),
        },
        SliceRecord {
            name: "slice-b".to_string(),
            expiry: None,
        },
    ]
}

#[tokio::test]
async fn empty_export_restores_to_empty() {
    let source = TestRegion::new();
    let target = TestRegion::new();

    let exported = source.controller.export().await;
    assert!(exported.is_none());

    target.controller.restore(exported.as_deref()).await;
    assert_eq!(target.controller.slice_count().await, 0);
}

#[tokio::test]
async fn export_then_restore_keeps_names_and_expiry() {
    let source = TestRegion::new();
    source.controller.restore(Some(records().as_slice())).await;

    let exported = source.controller.export().await.expect("two slices");
    assert_eq!(exported, records());

    let target = TestRegion::new();
    target.controller.restore(Some(exported.as_slice())).await;

    assert_slices(&target.controller, &["slice-a", "slice-b"]).await;
    assert_eq!(target.controller.export().await, Some(records()));
}

#[tokio::test]
async fn allocated_slice_exports_lease_end_in_millis() {
    let region = TestRegion::new();
    let lease_end = lease_end_tomorrow();
    region.control.queue_name("slice-a");
    region
        .controller
        .process_compute(
            compute_request(lease_end, SlicePolicy::New),
            NameIndices::default(),
            false,
        )
        .await
        .expect("allocation should succeed");

    let exported = region.controller.export_json().await.expect("encodes");
    assert_eq!(
        exported,
        Some(serde_json::json!([
            {"name": "slice-a", "expiry": (lease_end * 1000).to_string()}
        ]))
    );
}

#[tokio::test]
async fn json_round_trip_through_export() {
    let source = TestRegion::new();
    source.controller.restore(Some(records().as_slice())).await;
    let value = source.controller.export_json().await.expect("encodes");

    let target = TestRegion::new();
    target.controller.restore_json(value.as_ref()).await;

    assert_eq!(target.controller.export().await, Some(records()));
}

#[tokio::test]
async fn unreadable_expiry_restores_without_it() {
    let region = TestRegion::new();
    let record = SliceRecord {
        name: "slice-a".to_string(),
        expiry: Some("soon".to_string()),
    };

    region.controller.restore(Some(std::slice::from_ref(&record))).await;

    assert_eq!(
        region.controller.export().await,
        Some(vec![SliceRecord {
            name: "slice-a".to_string(),
            expiry: None,
        }])
    );
}

#[tokio::test]
async fn restore_of_nothing_is_ignored() {
    let region = TestRegion::new();
    region.controller.restore(Some(records().as_slice())).await;

    region.controller.restore(None).await;
    region.controller.restore_json(None).await;

    assert_slices(&region.controller, &["slice-a", "slice-b"]).await;
}

#[tokio::test]
async fn snapshot_rehydrates_controller() {
    let source = TestRegion::new();
    source.controller.restore(Some(records().as_slice())).await;
    let snapshot = source.controller.snapshot().await;
    assert_eq!(snapshot.site, TEST_SITE);
    assert_eq!(snapshot.workflow_id, TEST_WORKFLOW);

    let target = TestRegion::new();
    let controller = RegionController::from_snapshot(
        RegionConfig::new(TEST_SITE, TEST_WORKFLOW),
        target.factory.clone(),
        Arc::new(FixedFlavors::default()),
        &snapshot,
    )
    .expect("same region");

    assert_slices(&controller, &["slice-a", "slice-b"]).await;
}

#[tokio::test]
async fn snapshot_of_another_region_is_rejected() {
    let source = TestRegion::new();
    let snapshot = source.controller.snapshot().await;

    let err = RegionController::from_snapshot(
        RegionConfig::new("UH (Houston, TX USA)", TEST_WORKFLOW),
        source.factory.clone(),
        Arc::new(FixedFlavors::default()),
        &snapshot,
    )
    .unwrap_err();

    assert!(err.is_bad_request());
}
