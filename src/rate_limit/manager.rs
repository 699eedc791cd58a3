//! Rate Limiter
//!
//! Central entry point for recording platform usage and reading it back.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::config::{PolicyConfig, QuotaPolicyRegistry};
use super::error::QuotaError;
use super::quota::{compute_stats, UsageStats, WindowState};
use super::store::{QuotaKey, WindowedCounterStore};
use crate::metrics;

/// Result of recording usage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    /// Whether usage is still within policy after this recording
    pub allowed: bool,

    /// Usage after the recording was committed
    pub usage: UsageStats,

    /// Seconds until the window resets (if not allowed)
    pub retry_after_secs: Option<u64>,
}

impl Admission {
    fn from_usage(usage: UsageStats, now: DateTime<Utc>) -> Self {
        let allowed = usage.within_limit();
        let retry_after_secs = if allowed {
            None
        } else {
            Some(secs_until(now, usage.reset_at))
        };
        Self {
            allowed,
            usage,
            retry_after_secs,
        }
    }
}

/// Whole seconds from `now` until `at`, rounded up
fn secs_until(now: DateTime<Utc>, at: DateTime<Utc>) -> u64 {
    let millis = (at - now).num_milliseconds().max(0) as u64;
    millis.div_ceil(1000)
}

/// Per-platform, per-principal rate limiter
#[derive(Debug)]
pub struct RateLimiter {
    /// Platform policies
    registry: Arc<QuotaPolicyRegistry>,

    /// Window state, owned exclusively by this limiter
    store: WindowedCounterStore,

    /// Time source
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a limiter on the system clock
    pub fn new(registry: QuotaPolicyRegistry, store: WindowedCounterStore) -> Self {
        Self::with_clock(registry, store, Arc::new(SystemClock))
    }

    /// Create a limiter with an explicit time source
    pub fn with_clock(
        registry: QuotaPolicyRegistry,
        store: WindowedCounterStore,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            store,
            clock,
        }
    }

    /// Create with the default platform policies and an empty store
    pub fn default_config() -> Self {
        Self::new(
            QuotaPolicyRegistry::with_default_policies(),
            WindowedCounterStore::new(),
        )
    }

    /// Record one unit of usage
    pub fn record(&self, platform: &str, principal: &str) -> Result<bool, QuotaError> {
        self.record_usage(platform, principal, 1)
    }

    /// Record `amount` units of usage.
    ///
    /// The increment is always committed; `false` means the window is now over
    /// its limit and the caller should reject the upstream request.
    pub fn record_usage(
        &self,
        platform: &str,
        principal: &str,
        amount: u64,
    ) -> Result<bool, QuotaError> {
        Ok(self.check_usage(platform, principal, amount)?.allowed)
    }

    /// Record `amount` units and return the full admission detail
    pub fn check_usage(
        &self,
        platform: &str,
        principal: &str,
        amount: u64,
    ) -> Result<Admission, QuotaError> {
        let policy = match self.registry.lookup(platform) {
            Ok(policy) => policy,
            Err(err) => {
                warn!(platform, principal, "Usage recorded for unconfigured platform");
                metrics::POLICY_NOT_FOUND_TOTAL.inc();
                return Err(err);
            }
        };
        if amount < 1 {
            return Err(QuotaError::InvalidAmount(amount));
        }

        let now = self.clock.now();
        let key = QuotaKey::new(platform, principal);
        let usage = self
            .store
            .read_modify_write(&key, |current| advance_window(current, policy, amount, now));

        metrics::USAGE_RECORDED_TOTAL
            .with_label_values(&[platform])
            .inc_by(amount);

        let admission = Admission::from_usage(usage, now);
        if admission.allowed {
            metrics::ADMISSIONS_TOTAL
                .with_label_values(&[platform, "allowed"])
                .inc();
        } else {
            metrics::ADMISSIONS_TOTAL
                .with_label_values(&[platform, "exceeded"])
                .inc();
            info!(
                platform,
                principal,
                used = admission.usage.used,
                limit = admission.usage.limit,
                "Quota exceeded"
            );
        }

        Ok(admission)
    }

    /// Get usage for a pair without mutating anything.
    ///
    /// Returns `None` if the platform is not configured.
    pub fn get_usage(&self, platform: &str, principal: &str) -> Option<UsageStats> {
        let policy = self.registry.get(platform)?;
        let state = self.store.read(&QuotaKey::new(platform, principal));
        Some(compute_stats(state.as_ref(), policy, self.clock.now()))
    }

    /// Get usage on every configured platform for a principal
    pub fn get_all_usage(&self, principal: &str) -> BTreeMap<String, UsageStats> {
        let now = self.clock.now();
        self.registry
            .policies()
            .into_iter()
            .map(|policy| {
                let state = self.store.read(&QuotaKey::new(&policy.platform, principal));
                (
                    policy.platform.clone(),
                    compute_stats(state.as_ref(), policy, now),
                )
            })
            .collect()
    }

    /// Drop windows that have already closed; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let removed = self.store.purge_expired(self.clock.now());
        if removed > 0 {
            debug!(removed, "Purged expired quota windows");
        }
        removed
    }

    /// Current instant according to the limiter's clock
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Get policy registry
    pub fn registry(&self) -> &QuotaPolicyRegistry {
        &self.registry
    }

    /// Stored window count, live or expired
    pub fn tracked_windows(&self) -> usize {
        self.store.len()
    }

    /// Copy of all stored windows (for dashboard)
    pub(crate) fn windows(&self) -> Vec<(QuotaKey, WindowState)> {
        self.store.snapshot()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::default_config()
    }
}

/// Apply one recording to the stored state; runs under the key's lock
fn advance_window(
    current: Option<WindowState>,
    policy: &PolicyConfig,
    amount: u64,
    now: DateTime<Utc>,
) -> (WindowState, UsageStats) {
    let mut window = match WindowState::live(current, now) {
        Some(window) => window,
        None => {
            if current.is_some() {
                debug!(platform = %policy.platform, "Quota window expired, starting new window");
                metrics::WINDOWS_RESET_TOTAL
                    .with_label_values(&[policy.platform.as_str()])
                    .inc();
            }
            WindowState::fresh(policy, now)
        }
    };

    window.count = match window.count.checked_add(amount) {
        Some(count) => count,
        None => {
            warn!(platform = %policy.platform, "Quota counter saturated");
            u64::MAX
        }
    };

    (window, compute_stats(Some(&window), policy, now))
}
