//! Per-session request throttling.
//!
//! Policy: a rolling window (default 10 minutes) with a fixed request cap
//! (default 20). The counter lives in the `rate_limits` table, one row per
//! session, and the read-then-write runs in a single transaction. Storage
//! errors fail open — availability wins over strict enforcement, and the
//! anomaly is logged for operators.

use chrono::{DateTime, Utc};

use crate::config::RateLimitConfig;
use crate::storage::SqliteStorage;

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    /// Requests left in the current window after this one.
    pub remaining: u32,
    /// Hint for the `Retry-After` header when denied; 0 when admitted.
    pub retry_after_secs: u64,
}

impl RateDecision {
    pub(crate) fn admitted(remaining: u32) -> Self {
        Self {
            allowed: true,
            remaining,
            retry_after_secs: 0,
        }
    }

    pub(crate) fn denied(retry_after_secs: u64) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            retry_after_secs,
        }
    }

    pub(crate) fn fail_open(max_requests: u32) -> Self {
        Self {
            allowed: true,
            remaining: max_requests,
            retry_after_secs: 0,
        }
    }
}

/// Check and record one request for `session_id` at time `now`.
pub async fn check_rate_limit(
    storage: &SqliteStorage,
    session_id: &str,
    now: DateTime<Utc>,
    config: &RateLimitConfig,
) -> RateDecision {
    match storage
        .rate_limit_admit(session_id, now, config.window_minutes, config.max_requests)
        .await
    {
        Ok(decision) => decision,
        Err(e) => {
            tracing::warn!(session_id, error = %e, "rate limit check failed, admitting request");
            RateDecision::fail_open(config.max_requests)
        }
    }
}
