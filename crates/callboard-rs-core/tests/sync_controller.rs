//! Sync controller integration tests against a scripted source.

use callboard_rs_config::{ReconcilePolicy, SyncConfig};
use callboard_rs_core::{FailureKind, Route, SyncController, SyncError};
use callboard_rs_protocol::{CallRecord, ChangeEvent};
use callboard_rs_test_utils::{RecordingObserver, ScriptedSource, call};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn controller(source: &Arc<ScriptedSource>, policy: ReconcilePolicy) -> SyncController {
    let config = SyncConfig {
        policy,
        ..SyncConfig::default()
    };
    SyncController::new(source.clone(), &config)
}

fn ids(records: &[CallRecord]) -> Vec<String> {
    records.iter().map(|record| record.id.clone()).collect()
}

/// Poll until `check` holds; change events reach the worker asynchronously.
async fn eventually(check: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

fn remote() -> Vec<CallRecord> {
    vec![
        call("b").at("2024-03-01T09:00:00Z").duration(30).build(),
        call("a").at("2024-03-01T10:00:00Z").duration(60).loved().build(),
    ]
}

/// Initialize loads the remote collection newest first.
#[tokio::test]
async fn initialize_loads_sorted_snapshot() {
    let source = Arc::new(ScriptedSource::new(remote()));
    let controller = controller(&source, ReconcilePolicy::Refetch);
    assert!(controller.status().loading);

    let status = controller.initialize().await;

    assert!(!status.loading);
    assert_eq!(status.last_error, None);
    assert!(status.last_synced_at.is_some());
    assert_eq!(ids(&controller.snapshot()), vec!["a", "b"]);
    assert_eq!(controller.stats().average_duration_seconds, 45);
}

/// A failed first load leaves an empty store and a load error.
#[tokio::test]
async fn initialize_failure_is_absorbed() {
    let source = Arc::new(ScriptedSource::new(remote()));
    source.fail_next_fetch("network down");
    let controller = controller(&source, ReconcilePolicy::Refetch);

    let status = controller.initialize().await;

    assert!(!status.loading);
    let failure = status.last_error.expect("load failure");
    assert_eq!(failure.kind, FailureKind::Load);
    assert!(failure.message.contains("network down"));
    assert!(controller.snapshot().is_empty());
    assert_eq!(controller.stats().total, 0);
}

/// A failed refetch keeps the previous snapshot; a later success clears the error.
#[tokio::test]
async fn failed_refetch_keeps_previous_snapshot() {
    let source = Arc::new(ScriptedSource::new(remote()));
    let controller = controller(&source, ReconcilePolicy::Refetch);
    controller.initialize().await;

    source.set_rows(Vec::new());
    source.fail_next_fetch("timeout");
    controller.refresh().await.expect("refresh");
    controller.settle().await.expect("settle");

    assert_eq!(ids(&controller.snapshot()), vec!["a", "b"]);
    assert_eq!(
        controller.status().last_error.map(|failure| failure.kind),
        Some(FailureKind::Load)
    );

    let status = controller.initialize().await;
    assert_eq!(status.last_error, None);
    assert!(controller.snapshot().is_empty());
}

/// Duplicate ids from the source collapse to one entry.
#[tokio::test]
async fn fetch_deduplicates_by_id() {
    let mut rows = remote();
    rows.push(call("a").at("2024-02-01T00:00:00Z").build());
    let source = Arc::new(ScriptedSource::new(rows));
    let controller = controller(&source, ReconcilePolicy::Refetch);

    controller.initialize().await;

    assert_eq!(ids(&controller.snapshot()), vec!["a", "b"]);
}

/// Under the refetch policy every change triggers a full reload.
#[tokio::test]
async fn refetch_policy_reloads_on_change() {
    let source = Arc::new(ScriptedSource::new(remote()));
    let controller = controller(&source, ReconcilePolicy::Refetch);
    controller.initialize().await;
    controller.start_listening().await.expect("listen");
    assert!(controller.status().listening);

    let fresh = call("c").at("2024-03-01T11:00:00Z").build();
    let mut rows = remote();
    rows.push(fresh.clone());
    source.set_rows(rows);
    assert!(source.push(ChangeEvent::Insert(fresh)).await);

    eventually(|| controller.snapshot().len() == 3).await;
    assert_eq!(ids(&controller.snapshot()), vec!["c", "a", "b"]);
    assert_eq!(source.fetch_count(), 2);
}

/// Under the refetch policy the event payload is ignored in favor of the source.
#[tokio::test]
async fn refetch_policy_trusts_source_over_payload() {
    let source = Arc::new(ScriptedSource::new(remote()));
    let controller = controller(&source, ReconcilePolicy::Refetch);
    controller.initialize().await;
    controller.start_listening().await.expect("listen");

    assert!(
        source
            .push(ChangeEvent::Delete {
                id: "a".to_string()
            })
            .await
    );

    eventually(|| source.fetch_count() == 2).await;
    controller.settle().await.expect("settle");
    assert_eq!(ids(&controller.snapshot()), vec!["a", "b"]);
}

/// Incremental inserts land at their sorted position.
#[tokio::test]
async fn incremental_insert_keeps_order() {
    let source = Arc::new(ScriptedSource::new(remote()));
    let controller = controller(&source, ReconcilePolicy::Incremental);
    controller.initialize().await;
    controller.start_listening().await.expect("listen");

    let middle = call("m").at("2024-03-01T09:30:00Z").meeting().build();
    assert!(source.push(ChangeEvent::Insert(middle)).await);

    eventually(|| controller.snapshot().len() == 3).await;
    assert_eq!(ids(&controller.snapshot()), vec!["a", "m", "b"]);
    assert_eq!(source.fetch_count(), 1);
    let meetings = controller.view(Route::Meetings);
    assert_eq!(ids(&meetings.records), vec!["m"]);
}

/// An insert for an existing id replaces it instead of duplicating.
#[tokio::test]
async fn incremental_insert_of_existing_id_replaces() {
    let source = Arc::new(ScriptedSource::new(remote()));
    let controller = controller(&source, ReconcilePolicy::Incremental);
    controller.initialize().await;
    controller.start_listening().await.expect("listen");

    let moved = call("b")
        .at("2024-03-01T12:00:00Z")
        .duration(90)
        .meeting()
        .build();
    assert!(source.push(ChangeEvent::Insert(moved)).await);

    eventually(|| controller.snapshot().first().map(|r| r.id.as_str()) == Some("b")).await;
    let snapshot = controller.snapshot();
    assert_eq!(ids(&snapshot), vec!["b", "a"]);
    assert_eq!(snapshot[0].duration, 90);
    assert_eq!(controller.stats().meeting_count, 1);
}

/// Updates replace in place and deletes remove by id.
#[tokio::test]
async fn incremental_update_and_delete() {
    let source = Arc::new(ScriptedSource::new(remote()));
    let controller = controller(&source, ReconcilePolicy::Incremental);
    controller.initialize().await;
    controller.start_listening().await.expect("listen");

    let updated = call("b")
        .at("2024-03-01T09:00:00Z")
        .duration(30)
        .meeting()
        .build();
    assert!(source.push(ChangeEvent::Update(updated)).await);
    eventually(|| controller.stats().meeting_count == 1).await;
    assert_eq!(ids(&controller.snapshot()), vec!["a", "b"]);

    assert!(
        source
            .push(ChangeEvent::Delete {
                id: "a".to_string()
            })
            .await
    );
    eventually(|| controller.snapshot().len() == 1).await;
    assert_eq!(ids(&controller.snapshot()), vec!["b"]);

    assert!(
        source
            .push(ChangeEvent::Delete {
                id: "missing".to_string()
            })
            .await
    );
    controller.settle().await.expect("settle");
    assert_eq!(ids(&controller.snapshot()), vec!["b"]);
}

/// Changes that arrive during a fetch are applied after it completes.
#[tokio::test]
async fn changes_during_fetch_apply_after_it() {
    let source = Arc::new(ScriptedSource::new(Vec::new()));
    let controller = Arc::new(controller(&source, ReconcilePolicy::Incremental));
    controller.start_listening().await.expect("listen");
    let gate = source.gate_fetches();

    let init = tokio::spawn({
        let controller = controller.clone();
        async move { controller.initialize().await }
    });
    gate.wait_started().await;

    let late = call("late").at("2024-03-02T00:00:00Z").build();
    assert!(source.push(ChangeEvent::Insert(late)).await);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(controller.snapshot().is_empty());

    source.set_rows(remote());
    gate.release();
    let status = init.await.expect("initialize task");
    assert!(!status.loading);

    eventually(|| controller.snapshot().len() == 3).await;
    assert_eq!(ids(&controller.snapshot()), vec!["late", "a", "b"]);
}

/// Starting twice keeps a single subscription.
#[tokio::test]
async fn start_listening_is_idempotent() {
    let source = Arc::new(ScriptedSource::new(remote()));
    let controller = controller(&source, ReconcilePolicy::Incremental);

    controller.start_listening().await.expect("first");
    controller.start_listening().await.expect("second");

    assert_eq!(source.subscribe_count(), 1);
    assert!(controller.is_listening());
}

/// Stopping releases the feed and ignores later notifications.
#[tokio::test]
async fn stop_listening_discards_later_changes() {
    let source = Arc::new(ScriptedSource::new(remote()));
    let controller = controller(&source, ReconcilePolicy::Incremental);
    controller.stop_listening();
    controller.initialize().await;
    controller.start_listening().await.expect("listen");

    controller.stop_listening();
    controller.stop_listening();
    assert!(!controller.status().listening);

    let _ = source
        .push(ChangeEvent::Insert(
            call("ignored").at("2024-04-01T00:00:00Z").build(),
        ))
        .await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    controller.settle().await.expect("settle");

    assert_eq!(ids(&controller.snapshot()), vec!["a", "b"]);
    eventually(|| !source.has_listener()).await;
}

/// Notifications already queued when stopping are dropped.
#[tokio::test]
async fn stop_listening_drops_queued_changes() {
    let source = Arc::new(ScriptedSource::new(remote()));
    let controller = Arc::new(controller(&source, ReconcilePolicy::Incremental));
    controller.start_listening().await.expect("listen");
    let gate = source.gate_fetches();

    let init = tokio::spawn({
        let controller = controller.clone();
        async move { controller.initialize().await }
    });
    gate.wait_started().await;
    assert!(
        source
            .push(ChangeEvent::Insert(
                call("queued").at("2024-04-01T00:00:00Z").build(),
            ))
            .await
    );
    tokio::time::sleep(Duration::from_millis(20)).await;

    controller.stop_listening();
    gate.release();
    init.await.expect("initialize task");
    controller.settle().await.expect("settle");

    assert_eq!(ids(&controller.snapshot()), vec!["a", "b"]);
}

/// A refused subscription leaves the controller working fetch-only.
#[tokio::test]
async fn subscription_failure_degrades_to_fetch_only() {
    let source = Arc::new(ScriptedSource::new(remote()));
    source.fail_subscribe("realtime disabled");
    let controller = controller(&source, ReconcilePolicy::Refetch);

    let err = controller.start_listening().await.unwrap_err();
    assert!(matches!(err, SyncError::Subscription(_)));
    let status = controller.status();
    assert!(!status.listening);
    assert_eq!(
        status.last_error.map(|failure| failure.kind),
        Some(FailureKind::Subscription)
    );

    controller.initialize().await;
    assert_eq!(controller.snapshot().len(), 2);
}

/// A broken feed flips `listening` off and allows a new subscription.
#[tokio::test]
async fn broken_feed_can_be_restarted() {
    let source = Arc::new(ScriptedSource::new(remote()));
    let controller = controller(&source, ReconcilePolicy::Incremental);
    controller.initialize().await;
    controller.start_listening().await.expect("listen");

    source.break_feed("socket reset").await;
    eventually(|| !controller.is_listening()).await;
    let failure = controller.status().last_error.expect("subscription failure");
    assert_eq!(failure.kind, FailureKind::Subscription);
    assert!(failure.message.contains("socket reset"));

    controller.start_listening().await.expect("relisten");
    assert_eq!(source.subscribe_count(), 2);
    assert_eq!(controller.status().last_error, None);
    assert!(
        source
            .push(ChangeEvent::Insert(
                call("c").at("2024-03-01T11:00:00Z").build()
            ))
            .await
    );
    eventually(|| controller.snapshot().len() == 3).await;
}

/// Observers see every mutation, in registration order.
#[tokio::test]
async fn observers_notified_in_registration_order() {
    let source = Arc::new(ScriptedSource::new(remote()));
    let controller = controller(&source, ReconcilePolicy::Incremental);
    let first = RecordingObserver::new("first");
    let second = RecordingObserver::with_log("second", first.log());
    controller.add_observer(Arc::new(first.clone()));
    controller.add_observer(Arc::new(second.clone()));

    controller.initialize().await;
    controller.start_listening().await.expect("listen");
    assert!(
        source
            .push(ChangeEvent::Delete {
                id: "b".to_string()
            })
            .await
    );
    eventually(|| controller.snapshot().len() == 1).await;

    let log = first.log();
    let tags: Vec<&str> = log.lock().iter().map(|(tag, _)| *tag).collect();
    assert_eq!(tags, vec!["first", "second", "first", "second"]);
    assert_eq!(
        second.snapshots(),
        vec![
            vec!["a".to_string(), "b".to_string()],
            vec!["a".to_string()]
        ]
    );
}

/// Dashboard scenario: stats over all records, leads as positive-or-meeting.
#[tokio::test]
async fn dashboard_projection_matches_store() {
    let rows = vec![
        call("1").at("2024-05-01T10:00:00Z").duration(10).build(),
        call("2").at("2024-05-01T11:00:00Z").duration(20).loved().build(),
        call("3").at("2024-05-01T12:00:00Z").duration(25).meeting().build(),
        call("4")
            .at("2024-05-01T13:00:00Z")
            .duration(0)
            .loved()
            .meeting()
            .build(),
    ];
    let source = Arc::new(ScriptedSource::new(rows));
    let controller = controller(&source, ReconcilePolicy::Refetch);
    assert!(controller.view(Route::Home).loading);
    controller.initialize().await;

    let home = controller.view(Route::Home);
    assert!(!home.loading);
    assert_eq!(home.stats.total, 4);
    assert_eq!(home.stats.average_duration_seconds, 13);
    assert_eq!(home.stats.meeting_count, 2);
    assert_eq!(home.stats.positive_count, 2);
    assert_eq!(ids(&home.records), vec!["4", "3", "2", "1"]);
    assert_eq!(ids(&controller.view(Route::Leads).records), vec!["4", "3", "2"]);
    assert_eq!(
        controller.view(Route::parse("/unknown")).records,
        home.records
    );
}

/// Startup loads records while the subscription is still opening.
#[tokio::test]
async fn start_loads_without_waiting_for_subscription() {
    let source = Arc::new(ScriptedSource::new(remote()));
    let gate = source.gate_subscribe();
    let controller = Arc::new(controller(&source, ReconcilePolicy::Incremental));

    let startup = tokio::spawn({
        let controller = controller.clone();
        async move { controller.start().await }
    });
    gate.wait_started().await;

    eventually(|| controller.snapshot().len() == 2).await;
    assert!(!controller.status().loading);
    assert!(!controller.is_listening());

    gate.release();
    let status = startup.await.expect("startup task");
    assert!(status.listening);
    assert!(controller.is_listening());
    assert_eq!(ids(&controller.snapshot()), vec!["a", "b"]);
}

/// A refused subscription at startup still leaves a loaded store.
#[tokio::test]
async fn start_absorbs_subscription_failure() {
    let source = Arc::new(ScriptedSource::new(remote()));
    source.fail_subscribe("realtime disabled");
    let controller = controller(&source, ReconcilePolicy::Refetch);

    let status = controller.start().await;

    assert!(!status.loading);
    assert!(!status.listening);
    assert_eq!(source.fetch_count(), 1);
    assert_eq!(ids(&controller.snapshot()), vec!["a", "b"]);
}
