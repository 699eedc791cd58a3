//! Quota Engine Error Types

/// Error types for quota operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuotaError {
    /// No policy is configured for the platform
    #[error("No quota policy configured for platform: {0}")]
    PolicyNotFound(String),

    /// Usage amounts must be at least 1
    #[error("Invalid usage amount {0}: must be at least 1")]
    InvalidAmount(u64),

    /// Policy rejected while building the registry
    #[error("Invalid policy for platform '{platform}': {reason}")]
    InvalidPolicy { platform: String, reason: String },
}

impl QuotaError {
    pub(crate) fn invalid_policy(platform: &str, reason: impl Into<String>) -> Self {
        QuotaError::InvalidPolicy {
            platform: platform.to_string(),
            reason: reason.into(),
        }
    }
}
