//! Per-node router configuration
//!
//! Everything that used to be a class-wide toggle (poison mode, timer
//! interval, route timeout) is an explicit field here and is handed to the
//! engine at construction.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Errors that can occur during configuration validation
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigError {
    #[error("Invalid timer interval: must be > 0 seconds")]
    InvalidTimerInterval,

    #[error("Invalid route timeout: must be > 0 seconds")]
    InvalidRouteTimeout,

    #[error("Route timeout ({timeout}s) is shorter than the timer interval ({interval}s)")]
    TimeoutShorterThanInterval { timeout: u64, interval: u64 },
}

// ============================================================================
// ROUTER CONFIG
// ============================================================================

/// Default seconds before a claim or learned route is considered stale
pub const DEFAULT_ROUTE_TIMEOUT_SECS: u64 = 15;

/// Default seconds between periodic advertisements
pub const DEFAULT_TIMER_INTERVAL_SECS: u64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Poisoned reverse + route poisoning instead of plain split horizon
    pub poison_mode: bool,

    /// Age (seconds) at which neighbor claims and learned routes expire
    pub route_timeout_secs: u64,

    /// Seconds between periodic full-table advertisements
    pub timer_interval_secs: u64,
}

impl RouterConfig {
    pub fn with_poison_mode(mut self, enabled: bool) -> Self {
        self.poison_mode = enabled;
        self
    }

    pub fn with_route_timeout(mut self, secs: u64) -> Self {
        self.route_timeout_secs = secs;
        self
    }

    pub fn with_timer_interval(mut self, secs: u64) -> Self {
        self.timer_interval_secs = secs;
        self
    }

    /// Validate config
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timer_interval_secs == 0 {
            return Err(ConfigError::InvalidTimerInterval);
        }

        if self.route_timeout_secs == 0 {
            return Err(ConfigError::InvalidRouteTimeout);
        }

        // A timeout shorter than one tick would expire every route between refreshes
        if self.route_timeout_secs < self.timer_interval_secs {
            return Err(ConfigError::TimeoutShorterThanInterval {
                timeout: self.route_timeout_secs,
                interval: self.timer_interval_secs,
            });
        }

        Ok(())
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            poison_mode: false,
            route_timeout_secs: DEFAULT_ROUTE_TIMEOUT_SECS,
            timer_interval_secs: DEFAULT_TIMER_INTERVAL_SECS,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
