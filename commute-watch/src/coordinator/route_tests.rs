//! Integration tests for the coordinator, driven through the tracker
//! and the mock fetcher.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveTime, Utc};

use crate::config::{RouteConfig, ThresholdConfig};
use crate::coordinator::{Availability, CoordinatorConfig, RouteTracker, TrackerError};
use crate::ldb::mock::MockFetcher;
use crate::ldb::{FetchError, StationBoard};
use crate::subscriber::test_support::RecordingSubscriber;

fn board_json(services: &str) -> StationBoard {
    serde_json::from_str(&format!(
        r#"{{"locationName": "London Paddington",
             "filterLocationName": "Reading",
             "trainServices": [{services}]}}"#
    ))
    .unwrap()
}

fn service(id: &str, std: &str, etd: &str, platform: &str) -> String {
    format!(
        r#"{{"serviceID": "{id}", "std": "{std}", "etd": "{etd}", "platform": "{platform}"}}"#
    )
}

fn midday() -> NaiveTime {
    NaiveTime::from_hms_opt(12, 0, 0).unwrap()
}

fn night() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 30, 0).unwrap()
}

/// Fast backoff and a pinned midday clock for deterministic tests.
fn runtime(local_time: fn() -> NaiveTime) -> CoordinatorConfig {
    CoordinatorConfig {
        backoff_base: Duration::from_millis(10),
        backoff_cap: Duration::from_millis(80),
        local_time,
        ..CoordinatorConfig::default()
    }
}

fn config() -> RouteConfig {
    RouteConfig::new("PAD", "RDG").unwrap()
}

/// Poll until `check` passes or the deadline expires.
async fn wait_for(mut check: impl FnMut() -> bool) {
    for _ in 0..500 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within deadline");
}

#[tokio::test]
async fn first_cycle_publishes_a_snapshot() {
    let mock = Arc::new(MockFetcher::new());
    mock.push_board(board_json(&service("s1", "12:10", "On time", "4")));

    let recorder = Arc::new(RecordingSubscriber::default());
    let mut tracker = RouteTracker::new(mock.clone()).with_runtime(runtime(midday));
    let handle = tracker.start(config(), vec![recorder.clone()]).unwrap();

    wait_for(|| handle.snapshot().is_some()).await;

    let snapshot = handle.snapshot().unwrap();
    assert_eq!(snapshot.facts.len(), 1);
    assert_eq!(snapshot.origin_name, "London Paddington");
    assert_eq!(snapshot.summary, "1 train on time");
    assert_eq!(recorder.snapshots.lock().unwrap().len(), 1);

    // Every cycle requests a fresh body from upstream
    assert_eq!(mock.force_fresh_seen(), vec![true]);

    tracker.shutdown_all().await;
}

#[tokio::test]
async fn manual_refresh_detects_platform_change() {
    let mock = Arc::new(MockFetcher::new());
    mock.push_board(board_json(&service("s1", "12:10", "On time", "4")));
    mock.push_board(board_json(&service("s1", "12:10", "On time", "4a")));

    let mut tracker = RouteTracker::new(mock.clone()).with_runtime(runtime(midday));
    let handle = tracker.start(config(), vec![]).unwrap();

    wait_for(|| handle.snapshot().is_some()).await;
    assert!(!handle.snapshot().unwrap().facts[0].platform_changed);

    assert!(handle.refresh().await);
    wait_for(|| mock.calls() == 2 && handle.snapshot().unwrap().facts[0].platform_changed).await;

    let fact = &handle.snapshot().unwrap().facts[0];
    assert_eq!(fact.platform.as_deref(), Some("4a"));
    assert_eq!(fact.previous_platform.as_deref(), Some("4"));

    tracker.shutdown_all().await;
}

#[tokio::test]
async fn transient_failures_back_off_and_keep_serving_the_snapshot() {
    let mock = Arc::new(MockFetcher::new());
    mock.push_board(board_json(&service("s1", "12:10", "On time", "4")));
    mock.push_error(FetchError::Timeout);
    mock.push_error(FetchError::RateLimited);
    mock.push_error(FetchError::Upstream {
        status: 503,
        message: "unavailable".into(),
    });
    // Script exhausted after this: the empty mock keeps failing with 404,
    // so the route never recovers within this test

    let recorder = Arc::new(RecordingSubscriber::default());
    let mut tracker = RouteTracker::new(mock.clone()).with_runtime(runtime(midday));
    let handle = tracker.start(config(), vec![recorder.clone()]).unwrap();

    wait_for(|| handle.snapshot().is_some()).await;

    // Kick the failure sequence; retries then run on backoff alone
    assert!(handle.refresh().await);
    wait_for(|| recorder.errors.lock().unwrap().len() >= 3).await;

    // The last-good snapshot is still the one being served
    let status = handle.status();
    assert!(status.consecutive_failures >= 3);
    assert_eq!(status.snapshot.as_ref().unwrap().facts[0].service_id, "s1");

    // A snapshot older than two intervals reads stale; a fresh one does not
    assert!(!status.is_stale(Utc::now()));
    let much_later = Utc::now() + chrono::Duration::hours(2);
    assert!(status.is_stale(much_later));

    // Errors were surfaced with a growing failure count
    let errors = recorder.errors.lock().unwrap();
    assert!(errors[0].contains("1 consecutive"));
    assert!(errors[2].contains("3 consecutive"));
    drop(errors);

    tracker.shutdown_all().await;
}

#[tokio::test]
async fn auth_failure_parks_the_route_until_manual_refresh() {
    let mock = Arc::new(MockFetcher::new());
    mock.push_error(FetchError::Auth);
    mock.push_board(board_json(&service("s1", "12:10", "On time", "4")));

    let recorder = Arc::new(RecordingSubscriber::default());
    let mut tracker = RouteTracker::new(mock.clone()).with_runtime(runtime(midday));
    let handle = tracker.start(config(), vec![recorder.clone()]).unwrap();

    wait_for(|| handle.status().auth_failed).await;

    // No snapshot has ever been produced: unavailable, not stale
    assert_eq!(
        handle.status().availability(Utc::now()),
        Availability::Unavailable
    );
    assert_eq!(recorder.errors.lock().unwrap().len(), 1);

    // Parked: no automatic retry happens
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(mock.calls(), 1);

    // A manual refresh after reconfiguration wakes the route
    assert!(handle.refresh().await);
    wait_for(|| handle.snapshot().is_some()).await;
    assert!(!handle.status().auth_failed);
    assert_eq!(
        handle.status().availability(Utc::now()),
        Availability::Fresh
    );

    tracker.shutdown_all().await;
}

#[tokio::test]
async fn refreshes_during_an_inflight_cycle_coalesce() {
    let mock = Arc::new(MockFetcher::new());
    mock.set_latency(Duration::from_millis(80));
    mock.push_board(board_json(&service("s1", "12:10", "On time", "4")));

    let mut tracker = RouteTracker::new(mock.clone()).with_runtime(runtime(midday));
    let handle = tracker.start(config(), vec![]).unwrap();

    // The first cycle is still in flight; these must fold into it
    assert!(handle.refresh().await);
    assert!(handle.refresh().await);
    assert!(handle.refresh().await);

    wait_for(|| handle.snapshot().is_some()).await;
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(mock.calls(), 1);

    tracker.shutdown_all().await;
}

#[tokio::test]
async fn night_policy_suspends_until_manual_refresh() {
    let mock = Arc::new(MockFetcher::new());
    mock.push_board(board_json(&service("s1", "23:40", "On time", "2")));
    mock.push_board(board_json(&service("s2", "23:55", "On time", "2")));

    let mut tracker = RouteTracker::new(mock.clone()).with_runtime(runtime(night));
    let handle = tracker.start(config(), vec![]).unwrap();

    wait_for(|| handle.status().suspended).await;
    assert_eq!(mock.calls(), 1);

    // Suspended: nothing fires on its own
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(mock.calls(), 1);

    // Manual refresh still works and runs immediately
    assert!(handle.refresh().await);
    wait_for(|| mock.calls() == 2).await;

    tracker.shutdown_all().await;
}

#[tokio::test]
async fn stop_cancels_the_route_and_its_pending_wakeup() {
    let mock = Arc::new(MockFetcher::new());
    mock.push_board(board_json(&service("s1", "12:10", "On time", "4")));

    let mut tracker = RouteTracker::new(mock.clone()).with_runtime(runtime(midday));
    let handle = tracker.start(config(), vec![]).unwrap();
    let id = handle.id().clone();

    wait_for(|| handle.snapshot().is_some()).await;
    assert_eq!(tracker.len(), 1);

    tracker.stop(&id).await.unwrap();
    assert!(tracker.is_empty());

    // The coordinator task is gone; commands no longer deliver
    assert!(!handle.refresh().await);
    assert!(matches!(
        tracker.stop(&id).await,
        Err(TrackerError::NotTracked(_))
    ));
}

#[tokio::test]
async fn duplicate_route_is_rejected() {
    let mock = Arc::new(MockFetcher::new());
    let mut tracker = RouteTracker::new(mock).with_runtime(runtime(midday));

    tracker.start(config(), vec![]).unwrap();
    assert!(matches!(
        tracker.start(config(), vec![]),
        Err(TrackerError::AlreadyTracked(_))
    ));

    tracker.shutdown_all().await;
}

#[tokio::test]
async fn hand_assembled_config_is_revalidated() {
    let mut broken = config();
    broken.thresholds = ThresholdConfig {
        severe_minutes: 1,
        major_minutes: 10,
        minor_minutes: 3,
    };

    let mock = Arc::new(MockFetcher::new());
    let mut tracker = RouteTracker::new(mock).with_runtime(runtime(midday));

    assert!(matches!(
        tracker.start(broken, vec![]),
        Err(TrackerError::Config(_))
    ));
}

#[tokio::test]
async fn malformed_board_is_a_transient_failure() {
    let mock = Arc::new(MockFetcher::new());
    // Entries with no usable fields at all
    mock.push_board(board_json(r#"{"etd": "On time"}"#));
    mock.push_board(board_json(&service("s1", "12:10", "On time", "4")));

    let recorder = Arc::new(RecordingSubscriber::default());
    let mut tracker = RouteTracker::new(mock.clone()).with_runtime(runtime(midday));
    let handle = tracker.start(config(), vec![recorder.clone()]).unwrap();

    // The malformed cycle fails, backs off, then the next board succeeds
    wait_for(|| handle.snapshot().is_some()).await;

    let errors = recorder.errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("no usable entries"));
    drop(errors);

    tracker.shutdown_all().await;
}

#[tokio::test]
async fn snapshot_truncates_to_configured_service_count() {
    let services = (0..6)
        .map(|i| service(&format!("s{i}"), &format!("12:{:02}", 10 + i), "On time", "4"))
        .collect::<Vec<_>>()
        .join(",");

    let mock = Arc::new(MockFetcher::new());
    mock.push_board(board_json(&services));

    let mut tracker = RouteTracker::new(mock).with_runtime(runtime(midday));
    let route = config().with_num_services(2).unwrap();
    let handle = tracker.start(route, vec![]).unwrap();

    wait_for(|| handle.snapshot().is_some()).await;

    let snapshot = handle.snapshot().unwrap();
    assert_eq!(snapshot.facts.len(), 2);
    assert_eq!(snapshot.total_services_found, 6);

    tracker.shutdown_all().await;
}
