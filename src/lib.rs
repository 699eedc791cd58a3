//! OmniProspect Quota Library
//!
//! This library provides the quota and rate-limit engine that guards every
//! outbound platform request made by OmniProspect, along with its
//! configuration loader and metrics.

pub mod config;
pub mod metrics;
pub mod rate_limit;

pub use rate_limit::{QuotaError, QuotaPolicyRegistry, RateLimiter, UsageStats};
