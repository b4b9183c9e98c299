//! Infrastructure for the remote tier
//!
//! Building blocks that [`crate::RemoteStore`] composes around a document backend:
//!
//! - [`RateLimiter`]: fixed-window budgets per operation class
//! - [`TtlCache`]: bounded read cache with per-entry expiry
//! - [`RetryPolicy`]: bounded attempt loop with configurable backoff

pub mod cache;
pub mod rate_limit;
pub mod retry;

pub use cache::TtlCache;
pub use rate_limit::{RateLimitResult, RateLimiter, RateLimiterStatistics};
pub use retry::{BackoffStrategy, RetryPolicy, RetryResult};
