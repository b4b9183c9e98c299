//! Property test strategies for mining states

use miner_core::MiningState;
use proptest::prelude::*;

pub use proptest;

/// Arbitrary, possibly invalid, mining state.
///
/// Balances and session rewards may be negative and the remaining time may exceed
/// the period, so the strategy also exercises invariant repair.
pub fn arb_mining_state() -> impl Strategy<Value = MiningState> {
    (
        proptest::option::of("[a-z]{1,8}"),
        -10.0f64..10_000.0,
        0.0001f64..1.0,
        any::<bool>(),
        0u64..30_000,
        1u64..30_000,
        -1.0f64..100.0,
        0u64..10_000_000,
    )
        .prop_map(
            |(user_id, balance, rate, active, time, period, session, end)| MiningState {
                user_id,
                balance,
                mining_rate: rate,
                mining_active: active,
                mining_time: time,
                mining_period: period,
                mining_session: session,
                mining_end_time: active.then_some(end),
                ..MiningState::default()
            },
        )
}

/// Arbitrary state that already satisfies every invariant.
pub fn arb_valid_mining_state() -> impl Strategy<Value = MiningState> {
    arb_mining_state().prop_map(|mut state| {
        state.enforce_invariants();
        state
    })
}
