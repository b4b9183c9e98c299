//! Local versus remote conflict resolution
//!
//! One writer per user means divergence only comes from a device that persisted
//! locally while offline, or from a remote document updated elsewhere. The policy
//! keeps whichever snapshot carries the higher balance and tells the caller which
//! tier to overwrite so both converge.

use miner_core::MiningState;
use tracing::debug;

/// Overwrite the caller must perform after reconciling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    /// Both tiers already agree, or only one exists and nothing needs copying.
    None,
    /// Remote won; write it to the local tier.
    OverwriteLocal,
    /// Local won; push it to the remote tier.
    OverwriteRemote,
}

/// Canonical snapshot plus the follow-up write.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    /// Snapshot to seed the session with
    pub state: MiningState,
    /// Tier to overwrite with `state`
    pub action: ReconcileAction,
}

/// Pick the canonical snapshot.
///
/// A single present side wins outright. With neither present the default state
/// is returned. With both, the higher balance wins and ties keep local.
pub fn reconcile(local: Option<MiningState>, remote: Option<MiningState>) -> Reconciled {
    let (state, action) = match (local, remote) {
        (None, None) => (MiningState::default(), ReconcileAction::None),
        (Some(local), None) => (local, ReconcileAction::None),
        (None, Some(remote)) => (remote, ReconcileAction::None),
        (Some(local), Some(remote)) => {
            if remote.balance > local.balance {
                (remote, ReconcileAction::OverwriteLocal)
            } else if local.balance > remote.balance {
                (local, ReconcileAction::OverwriteRemote)
            } else {
                (local, ReconcileAction::None)
            }
        }
    };
    debug!(balance = state.balance, ?action, "Reconciled local and remote state");
    Reconciled { state, action }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_balance(balance: f64) -> MiningState {
        MiningState {
            balance,
            ..MiningState::for_user("u1")
        }
    }

    #[test]
    fn higher_remote_balance_wins() {
        let result = reconcile(Some(with_balance(5.0)), Some(with_balance(12.0)));
        assert_eq!(result.state.balance, 12.0);
        assert_eq!(result.action, ReconcileAction::OverwriteLocal);
    }

    #[test]
    fn higher_local_balance_wins() {
        let result = reconcile(Some(with_balance(12.0)), Some(with_balance(5.0)));
        assert_eq!(result.state.balance, 12.0);
        assert_eq!(result.action, ReconcileAction::OverwriteRemote);
    }

    #[test]
    fn single_side_is_returned() {
        let result = reconcile(None, Some(with_balance(3.0)));
        assert_eq!(result.state.balance, 3.0);
        assert_eq!(result.action, ReconcileAction::None);

        let result = reconcile(Some(with_balance(4.0)), None);
        assert_eq!(result.state.balance, 4.0);
    }

    #[test]
    fn neither_side_yields_default() {
        let result = reconcile(None, None);
        assert_eq!(result.state, MiningState::default());
        assert_eq!(result.action, ReconcileAction::None);
    }

    #[test]
    fn tie_keeps_local_without_writes() {
        let mut local = with_balance(6.0);
        local.mining_time = 10;
        let result = reconcile(Some(local.clone()), Some(with_balance(6.0)));
        assert_eq!(result.state, local);
        assert_eq!(result.action, ReconcileAction::None);
    }
}
