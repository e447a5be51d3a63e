//! Link configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Timing and presentation settings shared by every group in a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Debounce window for reactive observers, in milliseconds.
    ///
    /// After a mutation, an observer re-runs once this much time has passed
    /// without another mutation of the kind it watches.
    pub observer_debounce_ms: u64,

    /// Upper bound on how long an observer can be deferred, in milliseconds.
    ///
    /// Continuous brushing keeps resetting the debounce window; this forces a
    /// run once the first pending change is this old.
    pub max_wait_ms: u64,

    /// Delay before fanning a mutation out to consumers, in milliseconds.
    ///
    /// Zero delivers on the next flush.
    pub notify_delay_ms: u64,

    /// Name of the tri-state column added by `read_with_selection`.
    pub selection_column: String,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            observer_debounce_ms: 150,
            max_wait_ms: 1_000,
            notify_delay_ms: 0,
            selection_column: "selected_".to_string(),
        }
    }
}

impl LinkConfig {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the settings are internally consistent.
    pub fn validate(&self) -> Result<()> {
        if self.max_wait_ms < self.observer_debounce_ms {
            return Err(Error::InvalidConfig {
                message: format!(
                    "max_wait_ms ({}) is shorter than observer_debounce_ms ({})",
                    self.max_wait_ms, self.observer_debounce_ms
                ),
            });
        }
        if self.selection_column.is_empty() {
            return Err(Error::InvalidConfig {
                message: "selection_column must not be empty".to_string(),
            });
        }
        Ok(())
    }

    #[inline]
    pub fn observer_debounce(&self) -> Duration {
        Duration::from_millis(self.observer_debounce_ms)
    }

    #[inline]
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    #[inline]
    pub fn notify_delay(&self) -> Duration {
        Duration::from_millis(self.notify_delay_ms)
    }
}
