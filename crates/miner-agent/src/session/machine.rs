//! Session timer and reward core
//!
//! [`SessionStateMachine`] owns the live [`MiningState`] and applies start, stop,
//! tick and restore transitions to it. It performs no I/O: every transition takes
//! the current wall-clock reading and returns a [`Transition`] describing the
//! events to emit and the persistence the owner must perform.
//!
//! Elapsed time is always the difference between wall-clock readings. Sub-second
//! remainders carry into the next tick, and reward boundaries are counted from the
//! cumulative elapsed session time, so late or merged ticks neither skip nor repeat
//! a boundary.

use miner_core::{
    round_reward, MinerError, MiningState, Result, SessionConfig, SessionEvent, SessionPhase,
    TimestampMs,
};
use tracing::{debug, info, warn};

/// Persistence the owner performs after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistAction {
    /// Nothing worth writing.
    None,
    /// Periodic save between reward events.
    Opportunistic,
    /// Something significant changed; write now.
    Immediate,
}

/// Result of applying one operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// Notifications, in order
    pub events: Vec<SessionEvent>,
    /// Required local write
    pub persist: PersistAction,
    /// Whether the remote write should bypass the throttle
    pub force_remote: bool,
}

impl Transition {
    fn idle() -> Self {
        Self {
            events: Vec::new(),
            persist: PersistAction::None,
            force_remote: false,
        }
    }

    fn immediate(events: Vec<SessionEvent>) -> Self {
        Self {
            events,
            persist: PersistAction::Immediate,
            force_remote: false,
        }
    }

    /// Whether the owner needs to write anything.
    pub fn needs_persist(&self) -> bool {
        self.persist != PersistAction::None
    }

    /// Whether the transition ended the session.
    pub fn is_terminal(&self) -> bool {
        self.events.iter().any(SessionEvent::is_terminal)
    }
}

/// Countdown and reward state machine.
#[derive(Debug, Clone)]
pub struct SessionStateMachine {
    state: MiningState,
    reward_interval_secs: u64,
    local_save_interval_ms: u64,
    last_tick_ms: Option<TimestampMs>,
    carry_ms: u64,
    last_persist_ms: TimestampMs,
}

impl SessionStateMachine {
    /// Machine seeded with `state`. Call [`restore`](Self::restore) before ticking a
    /// running state loaded from storage.
    pub fn new(mut state: MiningState, config: &SessionConfig) -> Self {
        state.enforce_invariants();
        Self {
            state,
            reward_interval_secs: config.reward_interval_secs.max(1),
            local_save_interval_ms: config.local_save_interval_secs.saturating_mul(1000),
            last_tick_ms: None,
            carry_ms: 0,
            last_persist_ms: 0,
        }
    }

    /// Live state.
    pub fn state(&self) -> &MiningState {
        &self.state
    }

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        self.state.phase()
    }

    /// Record that the live state was written locally at `saved_at`.
    pub fn mark_saved(&mut self, saved_at: TimestampMs) {
        self.state.last_saved = saved_at;
    }

    /// Begin a session of `period_secs` at `now_ms`.
    pub fn start(&mut self, period_secs: u64, now_ms: TimestampMs) -> Result<Transition> {
        if self.state.mining_active {
            return Err(MinerError::invalid_state("a mining session is already running"));
        }
        if period_secs == 0 {
            return Err(MinerError::invalid("session period must be positive"));
        }

        let state = &mut self.state;
        state.mining_active = true;
        state.mining_period = period_secs;
        state.mining_time = period_secs;
        state.mining_session = 0.0;
        state.mining_end_time = Some(now_ms.saturating_add(period_secs.saturating_mul(1000)));

        self.last_tick_ms = Some(now_ms);
        self.carry_ms = 0;
        self.last_persist_ms = now_ms;

        info!(user_id = ?state.user_id, period_secs, "Mining session started");
        Ok(Transition::immediate(vec![SessionEvent::SessionStarted {
            period_secs,
        }]))
    }

    /// Cancel the running session at `now_ms`.
    ///
    /// Elapsed time up to `now_ms` is applied first, so a boundary crossed since the
    /// last tick is still credited. The session accrual is already part of the
    /// balance and is not added again.
    pub fn stop(&mut self, now_ms: TimestampMs) -> Result<Transition> {
        if !self.state.mining_active {
            return Err(MinerError::invalid_state("no mining session is running"));
        }

        let mut transition = self.tick(now_ms);
        if transition.is_terminal() {
            return Ok(transition);
        }

        let session_reward = self.state.mining_session;
        let state = &mut self.state;
        state.mining_active = false;
        state.mining_time = 0;
        state.mining_session = 0.0;
        state.mining_end_time = None;
        self.last_tick_ms = None;
        self.carry_ms = 0;
        self.last_persist_ms = now_ms;

        info!(user_id = ?state.user_id, session_reward, balance = state.balance, "Mining session stopped");
        transition
            .events
            .push(SessionEvent::SessionStopped { session_reward });
        transition.persist = PersistAction::Immediate;
        transition.force_remote = true;
        Ok(transition)
    }

    /// Advance the countdown to `now_ms`.
    pub fn tick(&mut self, now_ms: TimestampMs) -> Transition {
        if !self.state.mining_active {
            return Transition::idle();
        }

        let last = *self.last_tick_ms.get_or_insert(now_ms);
        if now_ms < last {
            warn!(
                behind_ms = last - now_ms,
                "Clock moved backwards, treating as no elapsed time"
            );
            self.last_tick_ms = Some(now_ms);
            return Transition::idle();
        }

        let elapsed_ms = now_ms - last + self.carry_ms;
        let elapsed_secs = elapsed_ms / 1000;
        self.carry_ms = elapsed_ms % 1000;
        self.last_tick_ms = Some(now_ms);

        let mut events = Vec::new();
        let mut crossed = 0;
        if elapsed_secs > 0 {
            let period = self.state.mining_period;
            let old_time = self.state.mining_time;
            let new_time = old_time.saturating_sub(elapsed_secs);
            crossed = (period.saturating_sub(new_time) / self.reward_interval_secs)
                .saturating_sub(period.saturating_sub(old_time) / self.reward_interval_secs);
            self.state.mining_time = new_time;

            if crossed > 0 {
                let amount = self.credit(crossed);
                events.push(SessionEvent::RewardEarned { amount });
            }
        }

        if self.state.mining_time == 0 {
            events.push(self.complete());
            self.last_persist_ms = now_ms;
            return Transition::immediate(events);
        }

        if crossed > 0 {
            self.last_persist_ms = now_ms;
            return Transition::immediate(events);
        }

        if now_ms.saturating_sub(self.last_persist_ms) >= self.local_save_interval_ms {
            self.last_persist_ms = now_ms;
            return Transition {
                events,
                persist: PersistAction::Opportunistic,
                force_remote: false,
            };
        }

        Transition::idle()
    }

    /// Re-seed from a persisted or reconciled snapshot at `now_ms`.
    ///
    /// A running session's remaining time is recomputed from its end time. If the
    /// end time has passed, the session completes with the accrual it had when it
    /// was last saved; boundaries that passed while nothing was running are not
    /// credited.
    pub fn restore(&mut self, mut state: MiningState, now_ms: TimestampMs) -> Transition {
        let repaired = state.enforce_invariants();
        self.state = state;
        self.last_tick_ms = None;
        self.carry_ms = 0;
        self.last_persist_ms = now_ms;

        if !self.state.mining_active {
            return if repaired {
                Transition::immediate(Vec::new())
            } else {
                Transition::idle()
            };
        }

        let remaining = self.state.remaining_at(now_ms).unwrap_or(0);
        if remaining == 0 {
            info!(user_id = ?self.state.user_id, "Session expired while offline, finalizing");
            let event = self.complete();
            return Transition::immediate(vec![event]);
        }

        let corrected = remaining.min(self.state.mining_period);
        let drifted = corrected != self.state.mining_time;
        if drifted {
            debug!(
                persisted = self.state.mining_time,
                corrected, "Corrected remaining time from end time"
            );
        }
        self.state.mining_time = corrected;
        self.last_tick_ms = Some(now_ms);

        if drifted || repaired {
            Transition::immediate(Vec::new())
        } else {
            Transition::idle()
        }
    }

    fn credit(&mut self, boundaries: u64) -> f64 {
        let per_boundary = self.state.reward_per_boundary(self.reward_interval_secs);
        let amount = round_reward(per_boundary * boundaries as f64);
        self.state.balance = round_reward(self.state.balance + amount);
        self.state.mining_session = round_reward(self.state.mining_session + amount);
        debug!(boundaries, amount, balance = self.state.balance, "Reward boundary crossed");
        amount
    }

    fn complete(&mut self) -> SessionEvent {
        let session_reward = self.state.mining_session;
        let state = &mut self.state;
        state.mining_active = false;
        state.mining_time = state.mining_period;
        state.mining_session = 0.0;
        state.mining_end_time = None;
        self.last_tick_ms = None;
        self.carry_ms = 0;

        info!(user_id = ?state.user_id, session_reward, balance = state.balance, "Mining session completed");
        SessionEvent::SessionCompleted { session_reward }
    }
}
