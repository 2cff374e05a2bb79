//! Integration tests for periodic reconciliation and aggregate status.

use tessera_region::{NameIndices, SlicePolicy, SliceRecord};
use tessera_test_utils::{
    TEST_SITE, TestRegion, assert_indices_consistent, assert_slices, compute_request,
    init_test_logging, lease_end_tomorrow,
};

async fn allocate(region: &TestRegion, name: &str, lease_end: i64, name_index: u32) {
    region.control.queue_name(name);
    region
        .controller
        .process_compute(
            compute_request(lease_end, SlicePolicy::New),
            NameIndices::new(name_index, 0),
            false,
        )
        .await
        .expect("allocation should succeed");
}

#[tokio::test]
async fn shared_hostname_binds_to_first_enumerated_slice() {
    init_test_logging();
    let region = TestRegion::new();
    let lease_end = lease_end_tomorrow();
    allocate(&region, "slice-a", lease_end, 0).await;
    allocate(&region, "slice-b", lease_end, 1).await;
    region.control.set_reported_hostnames("slice-a", ["shared0"]);
    region.control.set_reported_hostnames("slice-b", ["shared0", "solo1"]);

    let report = region
        .controller
        .do_periodic()
        .await
        .expect("both slices have pending events");

    assert_eq!(
        region.controller.slice_for_hostname("shared0").await.as_deref(),
        Some("slice-a")
    );
    assert_eq!(
        region.controller.slice_for_hostname("solo1").await.as_deref(),
        Some("slice-b")
    );
    assert_eq!(report.site, TEST_SITE);
    assert_eq!(report.slices.len(), 2);
    assert_eq!(report.slices[1]["slice"], "slice-b");
}

#[tokio::test]
async fn quiet_pass_reports_nothing() {
    let region = TestRegion::new();
    allocate(&region, "slice-a", lease_end_tomorrow(), 0).await;

    assert!(region.controller.do_periodic().await.is_some());
    assert!(region.controller.do_periodic().await.is_none());
    assert_eq!(
        region.controller.slice_for_hostname("worker0").await.as_deref(),
        Some("slice-a")
    );
}

#[tokio::test]
async fn dead_slice_is_dropped_during_reconciliation() {
    let region = TestRegion::new();
    let lease_end = lease_end_tomorrow();
    allocate(&region, "slice-a", lease_end, 0).await;
    allocate(&region, "slice-b", lease_end, 1).await;
    region.controller.do_periodic().await;

    region.control.mark_dead("slice-a");
    region.controller.do_periodic().await;

    assert_slices(&region.controller, &["slice-b"]).await;
    assert!(region.controller.slice_for_hostname("worker0").await.is_none());
    assert!(!region.controller.live_hostnames().await.contains("worker0"));
    assert!(region.controller.live_hostnames().await.contains("worker1"));
    assert_indices_consistent(&region.controller).await;
}

#[tokio::test]
async fn notification_is_edge_triggered() {
    let region = TestRegion::new();
    allocate(&region, "slice-a", lease_end_tomorrow(), 0).await;
    assert!(!region.controller.needs_notification().await);

    region.controller.do_periodic().await;
    assert!(region.controller.needs_notification().await);

    region.controller.clear_notification().await;
    region.controller.do_periodic().await;
    assert!(!region.controller.needs_notification().await);
}

#[tokio::test]
async fn status_reports_live_nodes_only() {
    let region = TestRegion::new();
    allocate(&region, "slice-a", lease_end_tomorrow(), 0).await;

    // Nothing is live before the first reconciliation.
    assert!(region.controller.status().await.is_none());

    region.controller.do_periodic().await;
    let report = region.controller.status().await.expect("worker0 is live");
    assert_eq!(report.slices.len(), 1);
    assert_eq!(report.slices[0]["slice"], "slice-a");
    assert_eq!(report.slices[0]["nodes"], serde_json::json!(["worker0"]));
}

#[tokio::test]
async fn status_drops_dead_slices() {
    let region = TestRegion::new();
    let lease_end = lease_end_tomorrow();
    allocate(&region, "slice-a", lease_end, 0).await;
    allocate(&region, "slice-b", lease_end, 1).await;
    region.controller.do_periodic().await;

    region.control.mark_dead("slice-b");
    let report = region.controller.status().await.expect("slice-a is live");

    assert_eq!(report.slices.len(), 1);
    assert_slices(&region.controller, &["slice-a"]).await;
    assert!(region.controller.slice_for_hostname("worker1").await.is_none());
    assert_indices_consistent(&region.controller).await;
}

#[tokio::test]
async fn reconciliation_indexes_restored_slices() {
    let region = TestRegion::new();
    let lease_end = lease_end_tomorrow();
    let record = SliceRecord {
        name: "slice-a".to_string(),
        expiry: Some((lease_end * 1000).to_string()),
    };
    region.controller.restore(Some(std::slice::from_ref(&record))).await;
    assert!(region.controller.lease_index().await.is_empty());

    region.controller.do_periodic().await;
    assert_eq!(region.controller.lease_index().await.len(), 1);

    region
        .controller
        .process_compute(
            compute_request(lease_end, SlicePolicy::Default),
            NameIndices::default(),
            false,
        )
        .await
        .expect("restored slice should be reused");
    assert_slices(&region.controller, &["slice-a"]).await;
}

#[tokio::test]
async fn stop_continues_past_failed_teardown() {
    let region = TestRegion::new();
    let lease_end = lease_end_tomorrow();
    allocate(&region, "slice-a", lease_end, 0).await;
    allocate(&region, "slice-b", lease_end, 1).await;
    region.control.fail_stop("slice-a");

    region.controller.stop().await;

    assert_eq!(region.control.stopped(), vec!["slice-b".to_string()]);
    assert_eq!(region.controller.slice_count().await, 0);
    assert!(region.controller.lease_index().await.is_empty());
}
