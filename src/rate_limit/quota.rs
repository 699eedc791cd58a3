//! Window State and Usage Statistics
//!
//! Per-key window bookkeeping and the pure derivation of the stats shown on
//! dashboards and used for admission decisions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::config::PolicyConfig;

/// Counter state for one (platform, principal) window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowState {
    /// Units recorded in this window
    pub count: u64,

    /// Instant the window closes
    pub reset_at: DateTime<Utc>,
}

impl WindowState {
    /// Start an empty window at `now`
    pub fn fresh(policy: &PolicyConfig, now: DateTime<Utc>) -> Self {
        Self {
            count: 0,
            reset_at: now + policy.window_delta(),
        }
    }

    /// A window is expired once `now` reaches `reset_at`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.reset_at
    }

    /// Live window, if any, as seen at `now`
    pub fn live(state: Option<WindowState>, now: DateTime<Utc>) -> Option<WindowState> {
        state.filter(|s| !s.is_expired(now))
    }
}

/// Usage statistics for a (platform, principal) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    /// Platform the stats belong to
    pub platform: String,

    /// Units recorded in the current window
    pub used: u64,

    /// Policy maximum for the window
    pub limit: u64,

    /// Units left before the limit, never negative
    pub remaining: u64,

    /// When the current window closes
    pub reset_at: DateTime<Utc>,

    /// `used / limit` as a rounded percentage; exceeds 100 on overshoot
    pub percentage: u64,
}

impl UsageStats {
    /// Whether usage is still inside the policy
    pub fn within_limit(&self) -> bool {
        self.used <= self.limit
    }
}

/// Derive stats for a key from its stored state.
///
/// Absent or expired state yields the view of a window starting at `now`;
/// nothing is written anywhere.
pub fn compute_stats(
    state: Option<&WindowState>,
    policy: &PolicyConfig,
    now: DateTime<Utc>,
) -> UsageStats {
    let window = match state {
        Some(s) if !s.is_expired(now) => *s,
        _ => WindowState::fresh(policy, now),
    };

    UsageStats {
        platform: policy.platform.clone(),
        used: window.count,
        limit: policy.max_requests,
        remaining: policy.max_requests.saturating_sub(window.count),
        reset_at: window.reset_at,
        percentage: usage_percentage(window.count, policy.max_requests),
    }
}

/// `count / limit * 100`, rounded half away from zero.
///
/// Integer arithmetic in u128 keeps it exact for every u64 input, so ties such
/// as 1/200 (0.5 %) always round up to 1.
pub fn usage_percentage(count: u64, limit: u64) -> u64 {
    if limit == 0 {
        return 0;
    }
    let count = count as u128;
    let limit = limit as u128;
    let rounded = (count * 200 + limit) / (limit * 2);
    u64::try_from(rounded).unwrap_or(u64::MAX)
}
