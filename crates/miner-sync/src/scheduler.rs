//! Remote write cadence
//!
//! Local writes happen inline on the tick loop. Remote writes go through
//! [`PersistenceScheduler`], which decides whether a snapshot is worth sending and
//! keeps at most one write in flight. A request that arrives while a write is
//! outstanding replaces whatever was pending, so only the newest snapshot is sent
//! next.
//!
//! Connectivity transitions are reported on the shared event channel.

use crate::remote::{RemoteStore, RemoteWrite};
use miner_core::effects::{DocumentStoreEffects, RemoteError};
use miner_core::{MinerError, MiningState, RemoteConfig, Result, SessionEvent};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// When to send a snapshot without an explicit force.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThrottlePolicy {
    /// Minimum spacing after a committed write
    pub min_interval: Duration,
    /// Balance delta that bypasses the spacing
    pub balance_epsilon: f64,
}

impl ThrottlePolicy {
    /// Policy from the remote tier configuration.
    pub fn from_config(config: &RemoteConfig) -> Self {
        Self {
            min_interval: Duration::from_millis(config.min_save_interval_ms),
            balance_epsilon: config.balance_epsilon,
        }
    }
}

/// What happened to a write request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// A write task was started for this snapshot.
    Started,
    /// A write is in flight; this snapshot is queued behind it, replacing any
    /// earlier pending one.
    Coalesced,
    /// Anonymous state never leaves the device.
    SkippedAnonymous,
    /// Nothing significant changed inside the throttle window.
    SkippedThrottled,
}

#[derive(Debug, Default)]
struct SchedulerState {
    last_written: Option<MiningState>,
    last_write_at: Option<Instant>,
    in_flight: bool,
    pending: Option<MiningState>,
    offline: bool,
}

struct SchedulerInner<D> {
    remote: Arc<RemoteStore<D>>,
    policy: ThrottlePolicy,
    state: Mutex<SchedulerState>,
    events: broadcast::Sender<SessionEvent>,
    busy: watch::Sender<bool>,
}

/// Single-flight, throttled writer for the remote tier.
pub struct PersistenceScheduler<D> {
    inner: Arc<SchedulerInner<D>>,
}

impl<D> Clone for PersistenceScheduler<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: DocumentStoreEffects + 'static> PersistenceScheduler<D> {
    /// Create a scheduler writing through `remote` and reporting on `events`.
    pub fn new(
        remote: Arc<RemoteStore<D>>,
        policy: ThrottlePolicy,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        let (busy, _) = watch::channel(false);
        Self {
            inner: Arc::new(SchedulerInner {
                remote,
                policy,
                state: Mutex::new(SchedulerState::default()),
                events,
                busy,
            }),
        }
    }

    /// Record `state` as already present remotely, e.g. right after a load.
    pub fn mark_synced(&self, state: &MiningState) {
        let mut st = self.inner.state.lock();
        st.last_written = Some(state.clone());
        st.last_write_at = Some(Instant::now());
    }

    /// Whether `state` would be sent now under the throttle policy.
    pub fn should_write(&self, state: &MiningState) -> bool {
        let st = self.inner.state.lock();
        Self::is_due(&self.inner.policy, &st, state, Instant::now())
    }

    fn is_due(
        policy: &ThrottlePolicy,
        st: &SchedulerState,
        state: &MiningState,
        now: Instant,
    ) -> bool {
        let Some(last) = &st.last_written else {
            return true;
        };
        if last.mining_active != state.mining_active {
            return true;
        }
        if (state.balance - last.balance).abs() > policy.balance_epsilon {
            return true;
        }
        st.last_write_at
            .map_or(true, |at| now.saturating_duration_since(at) >= policy.min_interval)
    }

    /// Request a throttled write of `state`.
    pub fn request(&self, state: &MiningState) -> ScheduleOutcome {
        self.submit(state, false)
    }

    /// Request a write of `state` that bypasses the throttle.
    pub fn force(&self, state: &MiningState) -> ScheduleOutcome {
        self.submit(state, true)
    }

    fn submit(&self, state: &MiningState, force: bool) -> ScheduleOutcome {
        if state.user_id.is_none() {
            return ScheduleOutcome::SkippedAnonymous;
        }

        let mut st = self.inner.state.lock();
        if !force && !Self::is_due(&self.inner.policy, &st, state, Instant::now()) {
            return ScheduleOutcome::SkippedThrottled;
        }

        if st.in_flight {
            debug!(force, "Remote write in flight, coalescing");
            st.pending = Some(state.clone());
            return ScheduleOutcome::Coalesced;
        }

        st.in_flight = true;
        drop(st);
        self.inner.busy.send_replace(true);

        let inner = Arc::clone(&self.inner);
        let snapshot = state.clone();
        tokio::spawn(async move {
            let mut next = Some(snapshot);
            while let Some(snapshot) = next.take() {
                let outcome = inner.remote.save_state(&snapshot).await;
                next = inner.complete(snapshot, outcome);
            }
        });
        ScheduleOutcome::Started
    }

    /// Wait until no write is in flight.
    pub async fn wait_idle(&self) {
        let mut busy = self.inner.busy.subscribe();
        let _ = busy.wait_for(|busy| !*busy).await;
    }

    /// Whether the last write attempt ended offline.
    pub fn is_offline(&self) -> bool {
        self.inner.state.lock().offline
    }

    /// Most recent snapshot the backend acknowledged.
    pub fn last_written(&self) -> Option<MiningState> {
        self.inner.state.lock().last_written.clone()
    }
}

impl<D> SchedulerInner<D> {
    /// Apply a write outcome and hand back the next pending snapshot, if any.
    fn complete(
        &self,
        snapshot: MiningState,
        outcome: Result<RemoteWrite>,
    ) -> Option<MiningState> {
        let mut st = self.state.lock();
        match outcome {
            Ok(RemoteWrite::Committed { .. }) => {
                st.last_written = Some(snapshot);
                st.last_write_at = Some(Instant::now());
                if st.offline {
                    st.offline = false;
                    info!("Remote tier reachable again");
                    let _ = self.events.send(SessionEvent::ConnectivityRestored);
                }
            }
            Ok(RemoteWrite::Offline { attempts }) => {
                if !st.offline {
                    st.offline = true;
                    warn!(attempts, "Remote tier unreachable, continuing locally");
                    let _ = self.events.send(SessionEvent::ConnectivityLost);
                }
            }
            Err(MinerError::Remote(RemoteError::RateLimitExceeded { retry_after, .. })) => {
                debug!(?retry_after, "Remote write dropped by rate limit");
            }
            Err(e) => {
                warn!(error = %e, "Remote write failed");
            }
        }

        let next = st.pending.take();
        if next.is_none() {
            st.in_flight = false;
            drop(st);
            self.busy.send_replace(false);
        }
        next
    }
}
