//! Dispatch configuration
//!
//! Defaults can be overridden through environment variables:
//!
//! | Variable | Field | Default |
//! |---|---|---|
//! | `INDEXPILOT_SUBMIT_CAP` | `daily_submit_cap` | 200 |
//! | `INDEXPILOT_INSPECT_CAP` | `daily_inspect_cap` | 2000 |
//! | `INDEXPILOT_PACING_MS` | `pacing_delay_ms` | 200 |
//! | `INDEXPILOT_REQUEST_TIMEOUT_SECS` | `request_timeout_secs` | 30 |

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::Operation;

// ============================================================================
// Constants
// ============================================================================

/// Default per-credential daily cap for submit notifications
pub const DEFAULT_SUBMIT_CAP: u32 = 200;

/// Default per-credential daily cap for URL inspections
pub const DEFAULT_INSPECT_CAP: u32 = 2000;

/// Default delay between two external calls
pub const DEFAULT_PACING_MS: u64 = 200;

/// Default timeout for a single external HTTP call
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

pub const ENV_SUBMIT_CAP: &str = "INDEXPILOT_SUBMIT_CAP";
pub const ENV_INSPECT_CAP: &str = "INDEXPILOT_INSPECT_CAP";
pub const ENV_PACING_MS: &str = "INDEXPILOT_PACING_MS";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "INDEXPILOT_REQUEST_TIMEOUT_SECS";

// ============================================================================
// Configuration
// ============================================================================

/// Configuration shared by every dispatch run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Units one credential may spend on submit per day
    pub daily_submit_cap: u32,
    /// Units one credential may spend on inspect per day
    pub daily_inspect_cap: u32,
    /// Pause between consecutive external calls, in milliseconds
    pub pacing_delay_ms: u64,
    /// Timeout for a single external call, in seconds
    pub request_timeout_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            daily_submit_cap: DEFAULT_SUBMIT_CAP,
            daily_inspect_cap: DEFAULT_INSPECT_CAP,
            pacing_delay_ms: DEFAULT_PACING_MS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl DispatchConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    ///
    /// Unset keys keep their defaults; set but unparsable keys are an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup(ENV_SUBMIT_CAP) {
            config.daily_submit_cap = parse_var(ENV_SUBMIT_CAP, &v)?;
        }
        if let Some(v) = lookup(ENV_INSPECT_CAP) {
            config.daily_inspect_cap = parse_var(ENV_INSPECT_CAP, &v)?;
        }
        if let Some(v) = lookup(ENV_PACING_MS) {
            config.pacing_delay_ms = parse_var(ENV_PACING_MS, &v)?;
        }
        if let Some(v) = lookup(ENV_REQUEST_TIMEOUT_SECS) {
            config.request_timeout_secs = parse_var(ENV_REQUEST_TIMEOUT_SECS, &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations no run could make progress with
    pub fn validate(&self) -> Result<()> {
        if self.daily_submit_cap == 0 {
            return Err(Error::config("daily_submit_cap must be at least 1"));
        }
        if self.daily_inspect_cap == 0 {
            return Err(Error::config("daily_inspect_cap must be at least 1"));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::config("request_timeout_secs must be at least 1"));
        }
        Ok(())
    }

    /// Per-credential cap for the given operation
    pub fn unit_cap(&self, operation: Operation) -> u32 {
        match operation {
            Operation::Submit => self.daily_submit_cap,
            Operation::Inspect => self.daily_inspect_cap,
        }
    }

    pub fn pacing_delay(&self) -> Duration {
        Duration::from_millis(self.pacing_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| Error::config(format!("{} has an invalid value: {:?}", key, value)))
}
