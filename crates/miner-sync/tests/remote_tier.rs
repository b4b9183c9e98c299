//! Remote tier behaviour under faults: retries, timeouts, offline degradation,
//! single-flight scheduling and connectivity notifications.

use assert_matches::assert_matches;
use miner_core::effects::{OperationClass, RemoteError};
use miner_core::{MinerError, MiningState, RemoteConfig, SessionEvent};
use miner_sync::{PersistenceScheduler, RemoteStore, RemoteWrite, ScheduleOutcome, ThrottlePolicy};
use miner_testkit::{Fault, FlakyDocumentStore, StateBuilder};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn offline_write_retries_with_linear_backoff_then_degrades() {
    let backend = FlakyDocumentStore::new();
    backend.set_offline(true);
    let store = RemoteStore::new(backend.clone(), &RemoteConfig::default());

    let started = Instant::now();
    let write = store.save("u1", json!({ "balance": 1.0 })).await.unwrap();

    assert_eq!(write, RemoteWrite::Offline { attempts: 3 });
    assert_eq!(backend.save_calls(), 3);
    // 3 s after the first failure, 6 s after the second.
    assert_eq!(started.elapsed(), Duration::from_secs(9));
}

#[tokio::test(start_paused = true)]
async fn hung_attempts_time_out_and_are_retried() {
    let backend = FlakyDocumentStore::new();
    backend.script([Fault::Hang]);
    let store = RemoteStore::new(backend.clone(), &RemoteConfig::default());

    let started = Instant::now();
    let write = store.save("u1", json!({ "balance": 2.0 })).await.unwrap();

    assert_eq!(write, RemoteWrite::Committed { attempts: 2 });
    assert_eq!(started.elapsed(), Duration::from_secs(23));
    assert_eq!(backend.document("users", "u1"), Some(json!({ "balance": 2.0 })));
}

#[tokio::test(start_paused = true)]
async fn rejection_is_not_retried() {
    let backend = FlakyDocumentStore::new();
    backend.script([Fault::Reject]);
    let store = RemoteStore::new(backend.clone(), &RemoteConfig::default());

    let err = store.save("u1", json!({})).await.unwrap_err();
    assert_matches!(err, RemoteError::Rejected { .. });
    assert_eq!(backend.save_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn offline_read_is_absent_not_an_error() {
    let backend = FlakyDocumentStore::new();
    backend.set_offline(true);
    let store = RemoteStore::new(backend, &RemoteConfig::default());

    assert_eq!(store.load("u1").await.unwrap(), None);
    assert_eq!(store.load_state("u1").await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn over_budget_reads_never_reach_backend() {
    let backend = FlakyDocumentStore::new();
    let mut config = RemoteConfig::default();
    config.read_limit.max_operations = 2;
    let store = RemoteStore::new(backend.clone(), &config);

    store.load("u1").await.unwrap();
    store.load("u2").await.unwrap();
    let err = store.load_state("u3").await.unwrap_err();

    assert_matches!(
        err,
        MinerError::Remote(RemoteError::RateLimitExceeded {
            class: OperationClass::Read,
            ..
        })
    );
    assert_eq!(backend.get_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn corrupt_remote_document_is_reported() {
    let backend = FlakyDocumentStore::new();
    backend
        .backend()
        .insert("users", "u1", json!({ "schemaVersion": 1, "balance": "NaN" }));
    let store = RemoteStore::new(backend, &RemoteConfig::default());

    assert_matches!(
        store.load_state("u1").await,
        Err(MinerError::StorageCorruption { .. })
    );
}

fn scheduler(
    backend: &FlakyDocumentStore,
) -> (
    PersistenceScheduler<FlakyDocumentStore>,
    broadcast::Receiver<SessionEvent>,
) {
    let config = RemoteConfig::default();
    let remote = Arc::new(RemoteStore::new(backend.clone(), &config));
    let (events, rx) = broadcast::channel(16);
    (
        PersistenceScheduler::new(remote, ThrottlePolicy::from_config(&config), events),
        rx,
    )
}

#[tokio::test(start_paused = true)]
async fn connectivity_loss_and_recovery_are_announced_once() {
    let backend = FlakyDocumentStore::new();
    let (scheduler, mut events) = scheduler(&backend);
    let mut state = StateBuilder::user("u1").balance(1.0).build();

    backend.set_offline(true);
    scheduler.force(&state);
    scheduler.wait_idle().await;
    assert!(scheduler.is_offline());

    state.balance = 1.5;
    scheduler.force(&state);
    scheduler.wait_idle().await;

    backend.set_offline(false);
    state.balance = 2.0;
    scheduler.force(&state);
    scheduler.wait_idle().await;

    assert_eq!(events.try_recv().unwrap(), SessionEvent::ConnectivityLost);
    assert_eq!(events.try_recv().unwrap(), SessionEvent::ConnectivityRestored);
    assert!(events.try_recv().is_err());
    assert!(!scheduler.is_offline());
}

#[tokio::test(start_paused = true)]
async fn requests_during_a_write_coalesce_to_the_latest() {
    let backend = FlakyDocumentStore::new();
    backend.set_latency(Duration::from_secs(1));
    let (scheduler, _events) = scheduler(&backend);

    let mut state = StateBuilder::user("u1").balance(1.0).build();
    assert_eq!(scheduler.force(&state), ScheduleOutcome::Started);

    for balance in [2.0, 3.0, 4.0] {
        state.balance = balance;
        assert_eq!(scheduler.force(&state), ScheduleOutcome::Coalesced);
    }
    scheduler.wait_idle().await;

    assert_eq!(backend.save_calls(), 2);
    let written = scheduler.last_written().unwrap();
    assert_eq!(written.balance, 4.0);
    assert_eq!(backend.document("users", "u1").unwrap()["balance"], json!(4.0));
}

#[tokio::test(start_paused = true)]
async fn anonymous_states_stay_local() {
    let backend = FlakyDocumentStore::new();
    let (scheduler, _events) = scheduler(&backend);

    let outcome = scheduler.force(&MiningState::default());
    assert_eq!(outcome, ScheduleOutcome::SkippedAnonymous);
    scheduler.wait_idle().await;
    assert_eq!(backend.save_calls(), 0);
}
