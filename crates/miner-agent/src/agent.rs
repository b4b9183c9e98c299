//! Application handle
//!
//! [`MiningAgent`] is the single owner of a user's session: the state machine, both
//! persistence tiers, the remote write scheduler and the tick loop. Consumers share
//! it by cloning the handle.

use crate::session::{ActionDebouncer, PersistAction, SessionStateMachine, Transition};
use crate::task_registry::TaskRegistry;
use miner_core::effects::{ClockSource, DocumentStoreEffects, KeyValueStorage};
use miner_core::{MinerConfig, MiningState, Result, SessionEvent, SessionPhase};
use miner_sync::{
    reconcile, LocalStore, PersistenceScheduler, ReconcileAction, Reconciled, RemoteStore,
};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Shared fast-tier backend.
pub type SharedStorage = Arc<dyn KeyValueStorage>;
/// Shared durable-tier backend.
pub type SharedDocuments = Arc<dyn DocumentStoreEffects>;
/// Shared wall clock.
pub type SharedClock = Arc<dyn ClockSource>;

const EVENT_CAPACITY: usize = 64;

/// Presentation-ready summary of the session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MiningStatus {
    /// Session owner
    pub user_id: Option<String>,
    /// Accumulated reward
    pub balance: f64,
    /// Reward per minute
    pub mining_rate: f64,
    /// Estimated reward per day
    pub daily_rate: f64,
    /// Whether a session is running
    pub active: bool,
    /// Remaining time as `HH:MM:SS`
    pub remaining: String,
    /// Elapsed fraction of the session
    pub progress: f64,
    /// Reward accrued in the running session
    pub session_reward: f64,
    /// Whether the last remote write ended offline
    pub offline: bool,
}

struct AgentInner {
    config: MinerConfig,
    user_id: Option<String>,
    clock: SharedClock,
    local: LocalStore<SharedStorage, SharedClock>,
    remote: Arc<RemoteStore<SharedDocuments>>,
    scheduler: PersistenceScheduler<SharedDocuments>,
    machine: Mutex<SessionStateMachine>,
    debouncer: Mutex<ActionDebouncer>,
    ticking: AtomicBool,
    events: broadcast::Sender<SessionEvent>,
    tasks: TaskRegistry,
}

/// Mining session handle.
#[derive(Clone)]
pub struct MiningAgent {
    inner: Arc<AgentInner>,
}

impl MiningAgent {
    pub(crate) fn assemble(
        config: MinerConfig,
        user_id: Option<String>,
        storage: SharedStorage,
        documents: SharedDocuments,
        clock: SharedClock,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let local = LocalStore::new(storage, Arc::clone(&clock), &config.local);
        let remote = Arc::new(RemoteStore::new(documents, &config.remote));
        let scheduler = PersistenceScheduler::new(
            Arc::clone(&remote),
            miner_sync::ThrottlePolicy::from_config(&config.remote),
            events.clone(),
        );

        let fresh = MiningState::with_parameters(
            user_id.clone(),
            config.session.mining_rate,
            config.session.period_secs,
        );
        let machine = SessionStateMachine::new(fresh, &config.session);
        let debouncer = ActionDebouncer::new(config.session.action_cooldown());

        Self {
            inner: Arc::new(AgentInner {
                config,
                user_id,
                clock,
                local,
                remote,
                scheduler,
                machine: Mutex::new(machine),
                debouncer: Mutex::new(debouncer),
                ticking: AtomicBool::new(false),
                events,
                tasks: TaskRegistry::new(),
            }),
        }
    }

    /// Owner of this session, `None` when anonymous.
    pub fn user_id(&self) -> Option<&str> {
        self.inner.user_id.as_deref()
    }

    /// Active configuration.
    pub fn config(&self) -> &MinerConfig {
        &self.inner.config
    }

    /// Fast-tier store.
    pub fn local(&self) -> &LocalStore<SharedStorage, SharedClock> {
        &self.inner.local
    }

    /// Durable-tier store.
    pub fn remote(&self) -> &RemoteStore<SharedDocuments> {
        &self.inner.remote
    }

    /// Receive engine notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Copy of the live state.
    pub fn snapshot(&self) -> MiningState {
        self.inner.machine.lock().state().clone()
    }

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        self.inner.machine.lock().phase()
    }

    /// Summary for display.
    pub fn status(&self) -> MiningStatus {
        let state = self.snapshot();
        MiningStatus {
            user_id: state.user_id.clone(),
            balance: state.balance,
            mining_rate: state.mining_rate,
            daily_rate: state.daily_rate(),
            active: state.mining_active,
            remaining: state.format_remaining(),
            progress: state.progress(),
            session_reward: state.mining_session,
            offline: self.inner.scheduler.is_offline(),
        }
    }

    /// Load both tiers, reconcile them and seed the session.
    ///
    /// Remote failures are logged and treated as an absent remote snapshot. Returns
    /// the overwrite the reconciliation called for, already performed.
    pub async fn bootstrap(&self) -> ReconcileAction {
        let inner = &self.inner;
        let local = inner.local.load(inner.user_id.as_deref());
        let remote = match inner.user_id.as_deref() {
            Some(user) => match inner.remote.load_state(user).await {
                Ok(remote) => remote,
                Err(e) => {
                    warn!(user_id = user, error = %e, "Remote state unavailable, using local");
                    None
                }
            },
            None => None,
        };

        if let Some(remote) = &remote {
            inner.scheduler.mark_synced(remote);
        }

        let had_snapshot = local.is_some() || remote.is_some();
        let Reconciled { mut state, action } = reconcile(local, remote);
        if !had_snapshot {
            state = inner.machine.lock().state().clone();
        }
        if state.user_id.is_none() {
            state.user_id = inner.user_id.clone();
        }

        let now = inner.clock.now_ms();
        let transition = inner.machine.lock().restore(state, now);
        info!(
            user_id = ?inner.user_id,
            ?action,
            phase = ?self.phase(),
            "Session bootstrapped"
        );

        let transition = match action {
            ReconcileAction::OverwriteLocal => Transition {
                persist: PersistAction::Immediate,
                ..transition
            },
            ReconcileAction::OverwriteRemote => Transition {
                persist: PersistAction::Immediate,
                force_remote: true,
                ..transition
            },
            ReconcileAction::None => transition,
        };
        self.apply(transition);
        action
    }

    /// Start a session of the configured length.
    pub fn start_mining(&self) -> Result<()> {
        let now = Instant::now();
        self.inner.debouncer.lock().check(now)?;
        let transition = {
            let mut machine = self.inner.machine.lock();
            machine.start(self.inner.config.session.period_secs, self.inner.clock.now_ms())?
        };
        self.inner.debouncer.lock().record(now);
        self.apply(transition);
        Ok(())
    }

    /// Stop the running session.
    pub fn stop_mining(&self) -> Result<()> {
        let now = Instant::now();
        self.inner.debouncer.lock().check(now)?;
        let transition = self.inner.machine.lock().stop(self.inner.clock.now_ms())?;
        self.inner.debouncer.lock().record(now);
        self.apply(transition);
        Ok(())
    }

    /// Advance the session to the current time.
    ///
    /// Returns `false` when another tick was already in progress and this one was
    /// skipped.
    pub fn tick(&self) -> bool {
        if self.inner.ticking.swap(true, Ordering::AcqRel) {
            debug!("Tick already in progress, skipping");
            return false;
        }
        let transition = self.inner.machine.lock().tick(self.inner.clock.now_ms());
        self.apply(transition);
        self.inner.ticking.store(false, Ordering::Release);
        true
    }

    /// Drive [`tick`](Self::tick) on the configured cadence until shutdown.
    pub fn spawn_tick_loop(&self) {
        let weak: Weak<AgentInner> = Arc::downgrade(&self.inner);
        let period = self.inner.config.session.tick_interval();
        self.inner.tasks.spawn_interval(period, move || {
            let weak = weak.clone();
            async move {
                if let Some(inner) = weak.upgrade() {
                    MiningAgent { inner }.tick();
                }
            }
        });
        debug!(?period, "Tick loop started");
    }

    /// Stop the tick loop, flush locally and request a final remote write.
    ///
    /// Time elapsed since the last tick is applied first, so a session that ran
    /// past its end time is finalized before it is written. The remote write is
    /// not awaited; use [`flush_remote`](Self::flush_remote) to wait for it.
    pub fn shutdown(&self) {
        self.inner.tasks.shutdown();
        let catch_up = self.inner.machine.lock().tick(self.inner.clock.now_ms());
        for event in catch_up.events {
            let _ = self.inner.events.send(event);
        }

        let mut snapshot = self.snapshot();
        if self.inner.local.save(&mut snapshot) {
            self.inner.machine.lock().mark_saved(snapshot.last_saved);
        }
        self.inner.scheduler.force(&snapshot);
        info!(user_id = ?self.inner.user_id, balance = snapshot.balance, "Agent shut down");
    }

    /// Wait for any in-flight remote write to finish.
    pub async fn flush_remote(&self) {
        self.inner.scheduler.wait_idle().await;
    }

    fn apply(&self, transition: Transition) {
        let inner = &self.inner;
        if transition.needs_persist() {
            let mut snapshot = self.snapshot();
            if inner.local.save(&mut snapshot) {
                inner.machine.lock().mark_saved(snapshot.last_saved);
            } else {
                error!(user_id = ?inner.user_id, "Local persistence failed");
            }

            let outcome = if transition.force_remote {
                inner.scheduler.force(&snapshot)
            } else {
                inner.scheduler.request(&snapshot)
            };
            debug!(persist = ?transition.persist, ?outcome, "Persistence scheduled");
        }

        for event in transition.events {
            let _ = inner.events.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AgentBuilder;
    use miner_effects::{MemoryDocumentHandler, MemoryStorageHandler, SimulatedClock};

    #[tokio::test(start_paused = true)]
    async fn overlapping_tick_is_skipped() {
        let clock = SimulatedClock::new(1_700_000_000_000);
        let agent = AgentBuilder::new()
            .with_user("u1")
            .with_storage(Arc::new(MemoryStorageHandler::new()))
            .with_documents(Arc::new(MemoryDocumentHandler::new()))
            .with_clock(Arc::new(clock.clone()))
            .build()
            .unwrap();
        agent.bootstrap().await;
        agent.start_mining().unwrap();
        clock.advance_secs(60);

        agent.inner.ticking.store(true, Ordering::SeqCst);
        assert!(!agent.tick());
        assert_eq!(agent.snapshot().mining_time, 21_600);

        agent.inner.ticking.store(false, Ordering::SeqCst);
        assert!(agent.tick());
        assert_eq!(agent.snapshot().mining_time, 21_600 - 60);
        assert!(!agent.inner.ticking.load(Ordering::SeqCst));
    }
}
