// Prometheus metrics for the OmniProspect quota engine
//
// - Usage units recorded per platform (counter)
// - Admission outcomes per platform (counter)
// - Lookups against unconfigured platforms (counter)
// - Windows rolled over on access (counter)

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, Registry, TextEncoder};
use std::sync::Arc;

lazy_static! {
    pub static ref REGISTRY: Arc<Registry> = Arc::new(Registry::new());

    pub static ref USAGE_RECORDED_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("quota_usage_recorded_total", "Total usage units recorded"),
        &["platform"]
    ).expect("Failed to create usage recorded metric");

    pub static ref ADMISSIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("quota_admissions_total", "Admission decisions by outcome"),
        &["platform", "outcome"]
    ).expect("Failed to create admissions metric");

    pub static ref POLICY_NOT_FOUND_TOTAL: IntCounter = IntCounter::new(
        "quota_policy_not_found_total",
        "Usage recorded against an unconfigured platform"
    ).expect("Failed to create policy not found metric");

    pub static ref WINDOWS_RESET_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("quota_windows_reset_total", "Expired windows replaced by a new window"),
        &["platform"]
    ).expect("Failed to create windows reset metric");
}

/// Initialize metrics registry - must be called once at startup
pub fn init() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(USAGE_RECORDED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ADMISSIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(POLICY_NOT_FOUND_TOTAL.clone()))?;
    REGISTRY.register(Box::new(WINDOWS_RESET_TOTAL.clone()))?;
    Ok(())
}

/// Gather all metrics in Prometheus text format
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))?;
    String::from_utf8(buffer).map_err(|e| anyhow::anyhow!("Invalid UTF-8 in metrics: {}", e))
}
