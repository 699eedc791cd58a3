//! Quota Policy Configuration
//!
//! Platform policies and the immutable registry the limiter consults.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use super::error::QuotaError;

/// Default platform policies
pub const LINKEDIN_DAILY_LIMIT: u64 = 100; // profile views per day
pub const GOOGLE_DAILY_LIMIT: u64 = 100; // queries per day
pub const BING_MONTHLY_LIMIT: u64 = 1000; // queries per 30 days
pub const YAHOO_MINUTE_LIMIT: u64 = 2; // queries per minute

const DAY_SECS: u64 = 24 * 3600;

/// Longest window a policy may declare (ten years)
pub const MAX_WINDOW_SECS: u64 = 10 * 365 * DAY_SECS;

/// Rate policy for a single platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Platform identifier (e.g. "linkedin")
    pub platform: String,

    /// Window length in seconds
    pub window_secs: u64,

    /// Requests admitted per window
    pub max_requests: u64,
}

impl PolicyConfig {
    /// Create a new policy
    pub fn new(platform: impl Into<String>, window_secs: u64, max_requests: u64) -> Self {
        Self {
            platform: platform.into(),
            window_secs,
            max_requests,
        }
    }

    /// Get window duration
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Window as a signed delta for timestamp arithmetic
    pub(crate) fn window_delta(&self) -> chrono::Duration {
        // validated against MAX_WINDOW_SECS, so the cast cannot wrap
        chrono::Duration::seconds(self.window_secs as i64)
    }

    fn validate(&self) -> Result<(), QuotaError> {
        if self.platform.trim().is_empty() {
            return Err(QuotaError::invalid_policy(
                &self.platform,
                "platform name must not be empty",
            ));
        }
        if self.max_requests == 0 {
            return Err(QuotaError::invalid_policy(
                &self.platform,
                "max_requests must be > 0",
            ));
        }
        if self.window_secs == 0 {
            return Err(QuotaError::invalid_policy(
                &self.platform,
                "window_secs must be > 0",
            ));
        }
        if self.window_secs > MAX_WINDOW_SECS {
            return Err(QuotaError::invalid_policy(
                &self.platform,
                format!("window_secs must be <= {}", MAX_WINDOW_SECS),
            ));
        }
        Ok(())
    }
}

/// Policies the platform ships with
pub fn default_policies() -> Vec<PolicyConfig> {
    vec![
        PolicyConfig::new("linkedin", DAY_SECS, LINKEDIN_DAILY_LIMIT),
        PolicyConfig::new("google", DAY_SECS, GOOGLE_DAILY_LIMIT),
        PolicyConfig::new("bing", 30 * DAY_SECS, BING_MONTHLY_LIMIT),
        PolicyConfig::new("yahoo", 60, YAHOO_MINUTE_LIMIT),
    ]
}

/// Immutable platform -> policy table
#[derive(Debug, Clone)]
pub struct QuotaPolicyRegistry {
    policies: HashMap<String, PolicyConfig>,
}

impl QuotaPolicyRegistry {
    /// Build a registry, rejecting invalid or duplicate policies
    pub fn new<I>(policies: I) -> Result<Self, QuotaError>
    where
        I: IntoIterator<Item = PolicyConfig>,
    {
        let mut table = HashMap::new();
        for policy in policies {
            policy.validate()?;
            if table.contains_key(&policy.platform) {
                return Err(QuotaError::invalid_policy(
                    &policy.platform,
                    "duplicate platform",
                ));
            }
            table.insert(policy.platform.clone(), policy);
        }
        Ok(Self { policies: table })
    }

    /// Registry holding [`default_policies`]
    ///
    /// The built-in table always validates; if it ever stops doing so the
    /// registry comes back empty and every lookup fails with `PolicyNotFound`.
    pub fn with_default_policies() -> Self {
        match Self::new(default_policies()) {
            Ok(registry) => registry,
            Err(err) => {
                tracing::error!("Built-in quota policies are invalid: {}", err);
                Self {
                    policies: HashMap::new(),
                }
            }
        }
    }

    /// Look up the policy for a platform
    pub fn lookup(&self, platform: &str) -> Result<&PolicyConfig, QuotaError> {
        self.policies
            .get(platform)
            .ok_or_else(|| QuotaError::PolicyNotFound(platform.to_string()))
    }

    /// Look up without an error
    pub fn get(&self, platform: &str) -> Option<&PolicyConfig> {
        self.policies.get(platform)
    }

    /// Configured platform names, sorted
    pub fn platforms(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.policies.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Policies sorted by platform name
    pub fn policies(&self) -> Vec<&PolicyConfig> {
        let mut all: Vec<&PolicyConfig> = self.policies.values().collect();
        all.sort_by(|a, b| a.platform.cmp(&b.platform));
        all
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

impl Default for QuotaPolicyRegistry {
    fn default() -> Self {
        Self::with_default_policies()
    }
}
