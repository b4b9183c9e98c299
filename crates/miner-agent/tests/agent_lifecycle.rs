//! End-to-end session behaviour through the agent handle.

use assert_matches::assert_matches;
use miner_agent::{AgentBuilder, MiningAgent};
use miner_core::effects::KeyValueStorage;
use miner_core::{MinerConfig, MinerError, MiningState, SessionEvent, TimestampMs};
use miner_effects::{MemoryStorageHandler, SimulatedClock};
use miner_sync::{LocalStore, ReconcileAction};
use miner_testkit::{assert_reward_eq, FlakyDocumentStore, StateBuilder};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

const T0: TimestampMs = 1_700_000_000_000;
const USER: &str = "u1";

struct Harness {
    agent: MiningAgent,
    clock: SimulatedClock,
    storage: MemoryStorageHandler,
    remote: FlakyDocumentStore,
    events: broadcast::Receiver<SessionEvent>,
}

fn build(
    config: MinerConfig,
    user: Option<&str>,
    storage: &MemoryStorageHandler,
    remote: &FlakyDocumentStore,
    clock: &SimulatedClock,
) -> MiningAgent {
    let mut builder = AgentBuilder::new()
        .with_config(config)
        .with_storage(Arc::new(storage.clone()))
        .with_documents(Arc::new(remote.clone()))
        .with_clock(Arc::new(clock.clone()));
    if let Some(user) = user {
        builder = builder.with_user(user);
    }
    builder.build().unwrap()
}

fn harness_with(config: MinerConfig, user: Option<&str>) -> Harness {
    let clock = SimulatedClock::new(T0);
    let storage = MemoryStorageHandler::new();
    let remote = FlakyDocumentStore::new();
    let agent = build(config, user, &storage, &remote, &clock);
    let events = agent.subscribe();
    Harness {
        agent,
        clock,
        storage,
        remote,
        events,
    }
}

fn harness() -> Harness {
    harness_with(MinerConfig::default(), Some(USER))
}

fn drain(events: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}

async fn wait_cooldown() {
    tokio::time::advance(Duration::from_secs(3)).await;
}

#[tokio::test(start_paused = true)]
async fn one_long_tick_credits_every_boundary() {
    let mut config = MinerConfig::default();
    config.session.mining_rate = 0.1;
    let mut h = harness_with(config, Some(USER));
    h.agent.bootstrap().await;
    h.agent.start_mining().unwrap();

    h.clock.advance_secs(540);
    assert!(h.agent.tick());

    let state = h.agent.snapshot();
    assert_reward_eq(state.balance, 0.9);
    assert_reward_eq(state.mining_session, 0.9);
    assert_eq!(state.mining_time, 21_600 - 540);

    let events = drain(&mut h.events);
    assert_eq!(events.len(), 2);
    assert_matches!(events[1], SessionEvent::RewardEarned { amount } if (amount - 0.9).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn ticks_without_elapsed_time_change_nothing() {
    let h = harness();
    h.agent.bootstrap().await;
    h.agent.start_mining().unwrap();
    h.clock.advance_secs(100);
    h.agent.tick();

    let before = h.agent.snapshot();
    h.agent.tick();
    h.agent.tick();
    assert_eq!(h.agent.snapshot(), before);
}

#[tokio::test(start_paused = true)]
async fn stopping_mid_session_keeps_balance() {
    let mut h = harness();
    h.agent.bootstrap().await;
    h.agent.start_mining().unwrap();

    h.clock.advance_secs(90);
    h.agent.tick();
    wait_cooldown().await;
    h.agent.stop_mining().unwrap();

    let state = h.agent.snapshot();
    assert_eq!(state.balance, 0.0);
    assert!(!state.mining_active);
    assert_eq!(state.mining_time, 0);
    assert_eq!(state.mining_session, 0.0);
    assert_eq!(state.mining_end_time, None);

    let events = drain(&mut h.events);
    assert_eq!(
        events.last(),
        Some(&SessionEvent::SessionStopped {
            session_reward: 0.0
        })
    );
}

#[tokio::test(start_paused = true)]
async fn stop_reports_session_reward_without_double_credit() {
    let mut config = MinerConfig::default();
    config.session.mining_rate = 0.1;
    let mut h = harness_with(config, Some(USER));
    h.agent.bootstrap().await;
    h.agent.start_mining().unwrap();

    h.clock.advance_secs(200);
    wait_cooldown().await;
    h.agent.stop_mining().unwrap();

    assert_reward_eq(h.agent.snapshot().balance, 0.3);
    let events = drain(&mut h.events);
    assert_matches!(
        events.last(),
        Some(SessionEvent::SessionStopped { session_reward }) if (session_reward - 0.3).abs() < 1e-9
    );
}

#[tokio::test(start_paused = true)]
async fn rapid_activations_are_debounced() {
    let h = harness();
    h.agent.bootstrap().await;
    h.agent.start_mining().unwrap();

    assert_matches!(h.agent.stop_mining(), Err(MinerError::Debounced { .. }));
    assert!(h.agent.snapshot().mining_active);

    wait_cooldown().await;
    h.agent.stop_mining().unwrap();
}

#[tokio::test(start_paused = true)]
async fn session_completes_at_zero() {
    let mut config = MinerConfig::default();
    config.session.period_secs = 360;
    config.session.mining_rate = 0.1;
    let mut h = harness_with(config, Some(USER));
    h.agent.bootstrap().await;
    h.agent.start_mining().unwrap();

    h.clock.advance_secs(400);
    h.agent.tick();

    let state = h.agent.snapshot();
    assert!(!state.mining_active);
    assert_eq!(state.mining_time, 360);
    assert_eq!(state.mining_session, 0.0);
    assert_reward_eq(state.balance, 0.6);

    let events = drain(&mut h.events);
    assert_matches!(
        events.last(),
        Some(SessionEvent::SessionCompleted { session_reward }) if (session_reward - 0.6).abs() < 1e-9
    );
}

#[tokio::test(start_paused = true)]
async fn expired_session_is_finalized_on_restart() {
    let clock = SimulatedClock::new(T0);
    let storage = MemoryStorageHandler::new();
    let remote = FlakyDocumentStore::new();
    let config = MinerConfig::default();

    let mut persisted = StateBuilder::user(USER)
        .period(3600)
        .balance(2.0)
        .session_reward(0.4)
        .running(T0, 3600)
        .build();
    LocalStore::new(storage.clone(), clock.clone(), &config.local).save(&mut persisted);

    clock.set_ms(T0 + 3_700_000);
    let agent = build(config, Some(USER), &storage, &remote, &clock);
    let mut events = agent.subscribe();
    agent.bootstrap().await;

    let state = agent.snapshot();
    assert!(!state.mining_active);
    assert_eq!(state.mining_time, 3600);
    assert_eq!(state.mining_session, 0.0);
    assert_reward_eq(state.balance, 2.0);
    assert_eq!(
        drain(&mut events),
        vec![SessionEvent::SessionCompleted {
            session_reward: 0.4
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn reload_after_reward_tick_reproduces_state() {
    let h = harness();
    h.agent.bootstrap().await;
    h.agent.start_mining().unwrap();
    h.clock.advance_secs(180);
    h.agent.tick();
    let before = h.agent.snapshot();
    drop(h.agent);

    let reloaded = build(MinerConfig::default(), Some(USER), &h.storage, &h.remote, &h.clock);
    reloaded.bootstrap().await;
    let after = reloaded.snapshot();

    assert_eq!(after.balance, before.balance);
    assert_eq!(after.mining_time, before.mining_time);
    assert!(after.mining_active);
}

#[tokio::test(start_paused = true)]
async fn higher_remote_balance_overwrites_local() {
    let h = harness();
    let local_store = LocalStore::new(h.storage.clone(), h.clock.clone(), &MinerConfig::default().local);
    local_store.save(&mut StateBuilder::user(USER).balance(5.0).build());
    let remote_state = StateBuilder::user(USER).balance(12.0).build();
    h.remote
        .backend()
        .insert("users", USER, serde_json::to_value(&remote_state).unwrap());

    assert_eq!(h.agent.bootstrap().await, ReconcileAction::OverwriteLocal);
    assert_eq!(h.agent.snapshot().balance, 12.0);
    assert_eq!(local_store.load(Some(USER)).unwrap().balance, 12.0);
}

#[tokio::test(start_paused = true)]
async fn higher_local_balance_overwrites_remote() {
    let h = harness();
    LocalStore::new(h.storage.clone(), h.clock.clone(), &MinerConfig::default().local)
        .save(&mut StateBuilder::user(USER).balance(12.0).build());
    h.remote.backend().insert(
        "users",
        USER,
        serde_json::to_value(StateBuilder::user(USER).balance(5.0).build()).unwrap(),
    );

    assert_eq!(h.agent.bootstrap().await, ReconcileAction::OverwriteRemote);
    h.agent.flush_remote().await;
    assert_eq!(
        h.remote.document("users", USER).unwrap()["balance"],
        serde_json::json!(12.0)
    );
}

#[tokio::test(start_paused = true)]
async fn first_run_uses_configured_parameters() {
    let mut config = MinerConfig::default();
    config.session.mining_rate = 0.05;
    config.session.period_secs = 7200;
    let h = harness_with(config, Some(USER));

    assert_eq!(h.agent.bootstrap().await, ReconcileAction::None);
    let state = h.agent.snapshot();
    assert_eq!(state.user_id.as_deref(), Some(USER));
    assert_eq!(state.mining_rate, 0.05);
    assert_eq!(state.mining_period, 7200);
    assert!(h.storage.get("fcMinerUserData_u1_v1.0").unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn offline_remote_degrades_to_local_with_notification() {
    let mut h = harness();
    h.remote.set_offline(true);
    h.agent.bootstrap().await;
    h.agent.start_mining().unwrap();
    h.agent.flush_remote().await;

    assert!(h.storage.get("fcMinerUserData_u1_v1.0").unwrap().is_some());
    assert!(h.agent.status().offline);
    let events = drain(&mut h.events);
    assert!(events.contains(&SessionEvent::ConnectivityLost));

    h.remote.set_offline(false);
    wait_cooldown().await;
    h.agent.stop_mining().unwrap();
    h.agent.flush_remote().await;
    assert!(drain(&mut h.events).contains(&SessionEvent::ConnectivityRestored));
}

#[tokio::test(start_paused = true)]
async fn anonymous_sessions_never_touch_remote() {
    let h = harness_with(MinerConfig::default(), None);
    h.agent.bootstrap().await;
    h.agent.start_mining().unwrap();
    h.clock.advance_secs(180);
    h.agent.tick();
    h.agent.shutdown();
    h.agent.flush_remote().await;

    assert_eq!(h.remote.save_calls(), 0);
    assert_eq!(h.remote.get_calls(), 0);
    assert!(h.storage.get("fcMinerUserData").unwrap().is_some());
}

#[tokio::test(start_paused = true)]
async fn tick_loop_drives_the_session() {
    let mut config = MinerConfig::default();
    config.session.mining_rate = 0.1;
    let h = harness_with(config, Some(USER));
    h.agent.bootstrap().await;
    h.agent.start_mining().unwrap();
    h.agent.spawn_tick_loop();

    h.clock.advance_secs(180);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_reward_eq(h.agent.snapshot().balance, 0.3);

    h.agent.shutdown();
    h.clock.advance_secs(180);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_reward_eq(h.agent.snapshot().balance, 0.3);
}

#[tokio::test(start_paused = true)]
async fn shutdown_flushes_both_tiers() {
    let h = harness();
    h.agent.bootstrap().await;
    h.agent.start_mining().unwrap();
    h.agent.flush_remote().await;
    h.clock.advance_secs(20);
    h.agent.tick();

    h.agent.shutdown();
    h.agent.flush_remote().await;

    let local: MiningState = serde_json::from_str(
        &h.storage.get("fcMinerUserData_u1_v1.0").unwrap().unwrap(),
    )
    .unwrap();
    assert_eq!(local.mining_time, 21_600 - 20);
    assert_eq!(
        h.remote.document("users", USER).unwrap()["miningTime"],
        serde_json::json!(21_600 - 20)
    );
}

#[tokio::test(start_paused = true)]
async fn shutdown_after_end_time_finalizes_before_saving() {
    let mut config = MinerConfig::default();
    config.session.period_secs = 60;
    config.session.reward_interval_secs = 30;
    config.session.mining_rate = 0.1;
    let mut h = harness_with(config, Some(USER));
    h.agent.bootstrap().await;
    h.agent.start_mining().unwrap();
    h.agent.flush_remote().await;
    drain(&mut h.events);

    h.clock.advance_secs(61);
    h.agent.shutdown();
    h.agent.flush_remote().await;

    let local: MiningState = serde_json::from_str(
        &h.storage.get("fcMinerUserData_u1_v1.0").unwrap().unwrap(),
    )
    .unwrap();
    assert!(!local.mining_active);
    assert_eq!(local.mining_end_time, None);
    assert_reward_eq(local.balance, 0.1);
    assert_eq!(
        h.remote.document("users", USER).unwrap()["miningActive"],
        serde_json::json!(false)
    );

    let events = drain(&mut h.events);
    assert_matches!(
        events.as_slice(),
        [SessionEvent::RewardEarned { .. }, SessionEvent::SessionCompleted { session_reward }]
            if (session_reward - 0.1).abs() < 1e-9
    );
}
