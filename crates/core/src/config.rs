//! Engine configuration.
//!
//! All fields are optional in serialized form and fall back to the defaults
//! in [`crate::constants`].

use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::errors::{Result, ValidationError};
use crate::utils::retry::RetryPolicy;

/// Tunables for store access, refresh scheduling and the badge catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Deadline for a single store call (default: 5000ms)
    pub store_timeout_ms: u64,

    /// Attempts per store call, including the first one (default: 3)
    pub retry_max_attempts: u32,

    /// Backoff before the second attempt (default: 200ms)
    pub retry_base_delay_ms: u64,

    /// Cap for one backoff sleep (default: 2000ms)
    pub retry_max_delay_ms: u64,

    /// One-shot forced refresh after a campaign is opened (default: 1500ms)
    pub forced_refresh_delay_ms: u64,

    /// Periodic forced refresh while a campaign is open; `None` disables it
    pub refresh_interval_ms: Option<u64>,

    /// Sum of donations unlocking the cumulative amount badge (default: 100)
    pub cumulative_badge_target: Decimal,

    /// Donations to one campaign unlocking the loyalty badge (default: 10)
    pub loyalty_badge_target: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store_timeout_ms: DEFAULT_STORE_TIMEOUT_MS,
            retry_max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            retry_max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
            forced_refresh_delay_ms: DEFAULT_FORCED_REFRESH_DELAY_MS,
            refresh_interval_ms: Some(DEFAULT_REFRESH_INTERVAL_MS),
            cumulative_badge_target: Decimal::from(DEFAULT_CUMULATIVE_BADGE_TARGET),
            loyalty_badge_target: DEFAULT_LOYALTY_BADGE_TARGET,
        }
    }
}

impl EngineConfig {
    /// Parses a JSON document and validates the result.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that would make the engine block or never unlock badges.
    pub fn validate(&self) -> Result<()> {
        if self.store_timeout_ms == 0 {
            return Err(ValidationError::InvalidInput(
                "storeTimeoutMs must be greater than zero".to_string(),
            )
            .into());
        }
        if self.retry_max_attempts == 0 {
            return Err(ValidationError::InvalidInput(
                "retryMaxAttempts must be at least 1".to_string(),
            )
            .into());
        }
        if self.retry_base_delay_ms > self.retry_max_delay_ms {
            return Err(ValidationError::InvalidInput(
                "retryBaseDelayMs must not exceed retryMaxDelayMs".to_string(),
            )
            .into());
        }
        if self.refresh_interval_ms == Some(0) {
            return Err(ValidationError::InvalidInput(
                "refreshIntervalMs must be greater than zero when set".to_string(),
            )
            .into());
        }
        if self.cumulative_badge_target <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveAmount(self.cumulative_badge_target).into());
        }
        if self.loyalty_badge_target == 0 {
            return Err(ValidationError::InvalidInput(
                "loyaltyBadgeTarget must be at least 1".to_string(),
            )
            .into());
        }
        Ok(())
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn forced_refresh_delay(&self) -> Duration {
        Duration::from_millis(self.forced_refresh_delay_ms)
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        self.refresh_interval_ms.map(Duration::from_millis)
    }

    /// Builds the retry policy shared by every store call.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_max_attempts,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
            timeout: self.store_timeout(),
        }
    }
}
