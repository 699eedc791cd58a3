//! Compliance Dashboard Support
//!
//! Read-only views for status pages: per-principal compliance across every
//! configured platform, usage guidelines per platform, and a summary of the
//! whole store. Nothing here writes to the limiter.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::config::PolicyConfig;
use super::manager::RateLimiter;
use super::quota::{compute_stats, UsageStats};

/// Usage percentage at which a platform is flagged as approaching its limit
pub const APPROACHING_THRESHOLD_PERCENT: u64 = 80;

/// Compliance classification for one platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceLevel {
    /// Comfortably inside the policy
    Healthy,
    /// Close to the limit
    Approaching,
    /// Exactly at the limit; the next request will exceed it
    AtLimit,
    /// Over the limit for the current window
    Exceeded,
}

impl ComplianceLevel {
    /// Classify usage stats
    pub fn from_usage(usage: &UsageStats) -> Self {
        if usage.used > usage.limit {
            ComplianceLevel::Exceeded
        } else if usage.used == usage.limit {
            ComplianceLevel::AtLimit
        } else if usage.percentage >= APPROACHING_THRESHOLD_PERCENT {
            ComplianceLevel::Approaching
        } else {
            ComplianceLevel::Healthy
        }
    }
}

/// Compliance status for one platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformCompliance {
    /// Current usage
    pub usage: UsageStats,

    /// Classification of `usage`
    pub level: ComplianceLevel,

    /// Operator guidance for this level
    pub recommendations: Vec<String>,
}

impl PlatformCompliance {
    fn new(usage: UsageStats) -> Self {
        let level = ComplianceLevel::from_usage(&usage);
        let recommendations = recommendations_for(&usage, level);
        Self {
            usage,
            level,
            recommendations,
        }
    }
}

fn recommendations_for(usage: &UsageStats, level: ComplianceLevel) -> Vec<String> {
    let reset = usage.reset_at.to_rfc3339();
    match level {
        ComplianceLevel::Healthy => vec![format!(
            "{} usage is within policy ({} of {} used)",
            usage.platform, usage.used, usage.limit
        )],
        ComplianceLevel::Approaching => vec![
            format!(
                "Only {} {} requests remain in this window",
                usage.remaining, usage.platform
            ),
            "Prioritise high-value searches and batch lookups where possible".to_string(),
        ],
        ComplianceLevel::AtLimit => vec![
            format!("{} quota is fully used until {}", usage.platform, reset),
            "Pause automated searches on this platform".to_string(),
        ],
        ComplianceLevel::Exceeded => vec![
            format!(
                "{} quota exceeded by {} requests",
                usage.platform,
                usage.used - usage.limit
            ),
            format!("Stop sending requests to {} until {}", usage.platform, reset),
            "Review automation schedules to stay within platform policy".to_string(),
        ],
    }
}

/// Compliance report for one principal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceReport {
    /// Timestamp of report generation
    pub generated_at: chrono::DateTime<chrono::Utc>,

    /// Principal the report covers
    pub principal: String,

    /// Per-platform status, keyed by platform name
    pub platforms: BTreeMap<String, PlatformCompliance>,
}

impl ComplianceReport {
    /// Whether any platform is over its limit
    pub fn any_exceeded(&self) -> bool {
        self.platforms
            .values()
            .any(|p| p.level == ComplianceLevel::Exceeded)
    }
}

/// Summary of every window held by the limiter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSummary {
    /// Timestamp of data generation
    pub timestamp: chrono::DateTime<chrono::Utc>,

    /// Stored windows, live or expired
    pub tracked_windows: usize,

    /// Windows that have not yet reset
    pub active_windows: usize,

    /// Live windows over their limit
    pub exceeded_windows: usize,

    /// Distinct principals with a live window
    pub active_principals: usize,

    /// Units recorded in live windows, per platform
    pub platform_usage: BTreeMap<String, u64>,
}

/// Usage guidance for every configured platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceGuidelines {
    /// Guidance lines keyed by platform name
    pub guidelines: BTreeMap<String, Vec<String>>,

    /// Guidance that applies to every platform
    pub general_principles: Vec<String>,
}

fn describe_window(window_secs: u64) -> String {
    const UNITS: [(u64, &str); 4] = [(86_400, "day"), (3_600, "hour"), (60, "minute"), (1, "second")];

    // every valid window is at least one second, so the last unit always matches
    let (size, name) = UNITS
        .iter()
        .copied()
        .find(|(size, _)| window_secs % size == 0)
        .unwrap_or((1, "second"));
    match window_secs / size {
        1 => name.to_string(),
        n => format!("{} {}s", n, name),
    }
}

fn guidelines_for(policy: &PolicyConfig) -> Vec<String> {
    let mut lines = vec![format!(
        "At most {} requests per {}",
        policy.max_requests,
        describe_window(policy.window_secs)
    )];

    let extra: &[&str] = match policy.platform.as_str() {
        "linkedin" => &[
            "Only view profiles relevant to an active prospecting campaign",
            "Do not scrape connection lists or send automated messages",
        ],
        "google" => &[
            "Use the official Custom Search API rather than scraping result pages",
            "Cache results instead of repeating identical queries",
        ],
        "bing" => &["Use the Bing Web Search API with a registered key"],
        "yahoo" => &["Space queries out; bursts are throttled aggressively"],
        _ => &[],
    };
    lines.extend(extra.iter().map(|line| line.to_string()));
    lines
}

fn general_principles() -> Vec<String> {
    [
        "Respect each platform's terms of service and robots.txt",
        "Stay within the published quota for every platform",
        "Identify automated traffic honestly and never evade rate limits",
        "Collect only data needed for the prospecting task and keep it secure",
    ]
    .iter()
    .map(|line| line.to_string())
    .collect()
}

/// Dashboard builder over a limiter
pub struct DashboardBuilder<'a> {
    limiter: &'a RateLimiter,
}

impl<'a> DashboardBuilder<'a> {
    /// Create a new dashboard builder
    pub fn new(limiter: &'a RateLimiter) -> Self {
        Self { limiter }
    }

    /// Compliance for a principal on every configured platform
    pub fn principal_report(&self, principal: &str) -> ComplianceReport {
        let platforms = self
            .limiter
            .get_all_usage(principal)
            .into_iter()
            .map(|(platform, usage)| (platform, PlatformCompliance::new(usage)))
            .collect();

        ComplianceReport {
            generated_at: self.limiter.now(),
            principal: principal.to_string(),
            platforms,
        }
    }

    /// Compliance for a principal on one platform; `None` if unconfigured
    pub fn platform_report(&self, platform: &str, principal: &str) -> Option<PlatformCompliance> {
        self.limiter
            .get_usage(platform, principal)
            .map(PlatformCompliance::new)
    }

    /// Guidance for every configured platform
    pub fn guidelines(&self) -> ComplianceGuidelines {
        let guidelines = self
            .limiter
            .registry()
            .policies()
            .into_iter()
            .map(|policy| (policy.platform.clone(), guidelines_for(policy)))
            .collect();

        ComplianceGuidelines {
            guidelines,
            general_principles: general_principles(),
        }
    }

    /// Build store-wide summary
    pub fn summary(&self) -> StoreSummary {
        let now = self.limiter.now();
        let registry = self.limiter.registry();
        let windows = self.limiter.windows();

        let mut active_windows = 0;
        let mut exceeded_windows = 0;
        let mut principals = BTreeSet::new();
        let mut platform_usage: BTreeMap<String, u64> = registry
            .platforms()
            .into_iter()
            .map(|p| (p.to_string(), 0))
            .collect();

        for (key, state) in &windows {
            if state.is_expired(now) {
                continue;
            }
            active_windows += 1;
            principals.insert(key.principal.as_str());

            if let Some(policy) = registry.get(&key.platform) {
                let usage = compute_stats(Some(state), policy, now);
                if !usage.within_limit() {
                    exceeded_windows += 1;
                }
            }

            let total = platform_usage.entry(key.platform.clone()).or_insert(0);
            *total = total.saturating_add(state.count);
        }

        StoreSummary {
            timestamp: now,
            tracked_windows: windows.len(),
            active_windows,
            exceeded_windows,
            active_principals: principals.len(),
            platform_usage,
        }
    }
}
