//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Failed reconciliation:
//!     → backoff.rs (per-key exponential delay + jitter)
//!     → rate_limit.rs (queue-wide token bucket delay)
//!     → work queue re-adds the event after max(both)
//! ```
//!
//! # Design Decisions
//! - Delays are computed, never slept here; the caller decides how to wait
//! - Jittered backoff prevents thundering herd on shared failures

pub mod backoff;
pub mod rate_limit;
