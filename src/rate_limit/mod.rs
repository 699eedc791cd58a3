//! Quota and Rate Limit Module
//!
//! This module tracks, per external platform and per calling principal, how
//! many requests were made inside the platform's policy window, and answers
//! whether further requests should be admitted.
//!
//! # Features
//!
//! - Fixed windows that reset lazily on the next access
//! - Per-key atomic read-modify-write on a sharded map
//! - Side-effect-free usage statistics for status dashboards
//! - Compliance classification and recommendations per platform
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Rate Limiter                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐          │
//! │  │ Policy      │  │ Usage Stats │  │ Clock       │          │
//! │  │ Registry    │  │ Calculator  │  │             │          │
//! │  └─────────────┘  └─────────────┘  └─────────────┘          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │        Windowed Counter Store (sharded, in-memory)  │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Admission is advisory: a recording is always committed, and `false` tells
//! the caller to reject the upstream request.

pub mod clock;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod manager;
pub mod quota;
pub mod store;

#[cfg(test)]
mod proptests;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{PolicyConfig, QuotaPolicyRegistry};
pub use dashboard::{
    ComplianceGuidelines, ComplianceLevel, ComplianceReport, DashboardBuilder, StoreSummary,
};
pub use error::QuotaError;
pub use manager::{Admission, RateLimiter};
pub use quota::{compute_stats, UsageStats, WindowState};
pub use store::{QuotaKey, WindowedCounterStore};
