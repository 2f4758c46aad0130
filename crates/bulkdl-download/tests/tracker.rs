//! Progress tracking through polling and change notifications.

mod common;

use std::time::Duration;

use bulkdl_core::{
    BackendChange, BackendId, BackendState, BatchEvent, BatchManagerPort, SingleStatus,
};

use common::{Harness, manual_config, selection};

async fn started(h: &Harness, urls: &[&str]) -> Vec<BackendId> {
    h.manager
        .enqueue(urls.iter().map(|url| selection(url)).collect())
        .await
        .unwrap();
    h.manager.tick().await.unwrap();

    let mut ids = Vec::new();
    for url in urls {
        ids.push(h.item(url).await.as_single().unwrap().file.backend_id.unwrap());
    }
    ids
}

async fn progress(h: &Harness, url: &str) -> f64 {
    h.item(url).await.as_single().unwrap().file.progress
}

#[tokio::test]
async fn test_small_progress_moves_are_not_persisted() {
    let h = Harness::new(manual_config());
    let ids = started(&h, &["https://example.com/a"]).await;

    h.backend.set_progress(ids[0], 3, Some(1000));
    assert!(h.manager.poll_once().await.unwrap());
    assert!(progress(&h, "https://example.com/a").await.abs() < f64::EPSILON);

    h.backend.set_progress(ids[0], 10, Some(1000));
    h.manager.poll_once().await.unwrap();
    assert!((progress(&h, "https://example.com/a").await - 1.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_unknown_total_keeps_progress() {
    let h = Harness::new(manual_config());
    let ids = started(&h, &["https://example.com/a"]).await;

    h.backend.set_progress(ids[0], 500, None);
    h.manager.poll_once().await.unwrap();

    let item = h.item("https://example.com/a").await;
    let single = item.as_single().unwrap();
    assert_eq!(single.status, SingleStatus::Downloading);
    assert!(single.file.progress.abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_paused_observed_in_progress_is_downloading_again() {
    let h = Harness::new(manual_config());
    let ids = started(&h, &["https://example.com/a"]).await;

    h.manager.pause_all().await.unwrap();
    assert_eq!(
        h.item("https://example.com/a").await.as_single().unwrap().status,
        SingleStatus::Paused
    );

    // Resumed outside the manager.
    h.backend.set_state(ids[0], BackendState::InProgress);
    h.manager.poll_once().await.unwrap();

    assert_eq!(
        h.item("https://example.com/a").await.as_single().unwrap().status,
        SingleStatus::Downloading
    );
}

#[tokio::test]
async fn test_interrupted_transfer_fails_single() {
    let h = Harness::new(manual_config());
    let ids = started(&h, &["https://example.com/a"]).await;

    h.backend.interrupt(ids[0]);
    h.manager
        .handle_backend_change(BackendChange::state(ids[0], BackendState::Interrupted))
        .await;

    let item = h.item("https://example.com/a").await;
    let single = item.as_single().unwrap();
    assert_eq!(single.status, SingleStatus::Failed);
    assert_eq!(single.error.as_deref(), Some("download interrupted"));
    assert!(
        h.events
            .events()
            .iter()
            .any(|e| matches!(e, BatchEvent::ItemFailed { id, .. } if id == &single.id))
    );
}

#[tokio::test]
async fn test_terminal_single_ignores_late_observations() {
    let h = Harness::new(manual_config());
    let ids = started(&h, &["https://example.com/a"]).await;

    h.manager
        .handle_backend_change(BackendChange::state(ids[0], BackendState::Complete))
        .await;
    h.manager
        .handle_backend_change(BackendChange::state(ids[0], BackendState::Interrupted))
        .await;

    assert!(h.item("https://example.com/a").await.is_completed());
}

#[tokio::test]
async fn test_byte_notifications_are_throttled() {
    let h = Harness::new(manual_config().with_query_throttle(Duration::from_secs(60)));
    let ids = started(&h, &["https://example.com/a"]).await;

    h.backend.report_progress(ids[0], 100, Some(1000));
    h.manager
        .handle_backend_change(BackendChange::bytes(ids[0], 100, Some(1000)))
        .await;
    h.manager
        .handle_backend_change(BackendChange::bytes(ids[0], 200, Some(1000)))
        .await;

    assert_eq!(h.backend.query_count(), 1);
    assert!((progress(&h, "https://example.com/a").await - 10.0).abs() < f64::EPSILON);

    // Terminal changes bypass the throttle.
    h.manager
        .handle_backend_change(BackendChange::state(ids[0], BackendState::Complete))
        .await;
    assert!(h.item("https://example.com/a").await.is_completed());
}

#[tokio::test]
async fn test_poll_round_robin_over_transfers() {
    let h = Harness::new(manual_config().with_poll_batch_size(2));
    started(
        &h,
        &["https://example.com/1", "https://example.com/2", "https://example.com/3"],
    )
    .await;

    h.manager.poll_once().await.unwrap();
    assert_eq!(h.backend.query_count(), 2);
    h.manager.poll_once().await.unwrap();
    assert_eq!(h.backend.query_count(), 4);
}

#[tokio::test]
async fn test_poll_reports_idle_without_transfers() {
    let h = Harness::new(manual_config());
    assert!(!h.manager.poll_once().await.unwrap());

    let ids = started(&h, &["https://example.com/a"]).await;
    assert!(h.manager.poll_once().await.unwrap());

    h.backend.complete(ids[0]);
    h.manager.poll_once().await.unwrap();
    assert!(h.item("https://example.com/a").await.is_completed());
    assert!(!h.manager.poll_once().await.unwrap());
}

#[tokio::test]
async fn test_group_progress_follows_children() {
    let h = Harness::new(manual_config());
    h.resolver.answer_files("https://example.com/show", 2);
    h.manager
        .enqueue(vec![selection("https://example.com/show")])
        .await
        .unwrap();
    h.manager.tick().await.unwrap();

    // Group progress counts completed children only.
    h.backend.complete(BackendId(1));
    h.backend.set_progress(BackendId(2), 900, Some(1000));
    h.manager.poll_once().await.unwrap();

    let item = h.item("https://example.com/show").await;
    let group = item.as_multiple().unwrap();
    assert!((group.progress - 50.0).abs() < f64::EPSILON);
    assert!(item.is_active());

    h.backend.complete(BackendId(2));
    h.manager.poll_once().await.unwrap();
    assert!(h.item("https://example.com/show").await.is_completed());
}

#[tokio::test]
async fn test_group_with_a_failed_child_stays_incomplete() {
    let h = Harness::new(manual_config().with_concurrency_limit(3));
    h.resolver.answer_files("https://example.com/show", 3);
    h.manager
        .enqueue(vec![selection("https://example.com/show")])
        .await
        .unwrap();
    h.manager.tick().await.unwrap();
    assert_eq!(h.downloading().await, 3);

    h.backend.complete(BackendId(1));
    h.backend.complete(BackendId(2));
    h.backend.interrupt(BackendId(3));
    h.manager.poll_once().await.unwrap();

    let failed = h.item("https://example.com/show#part3").await;
    assert_eq!(failed.as_single().unwrap().status, SingleStatus::Failed);

    let item = h.item("https://example.com/show").await;
    let group = item.as_multiple().unwrap();
    assert!((group.progress - 200.0 / 3.0).abs() < 1e-9);
    assert!(!item.is_completed());
    assert!(item.is_active());
}
