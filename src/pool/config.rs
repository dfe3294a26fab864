use crate::utils::error::PoolError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What a probe does when an idle connection turns out to have unread bytes.
///
/// Idle connections are expected to be silent, so the default treats any
/// unsolicited byte as a broken connection. Protocols where the peer may push
/// data on its own (server greetings, keepalive frames) should use `Retain`,
/// which keeps the byte and hands it to the next reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnsolicitedDataPolicy {
    #[default]
    Discard,
    Retain,
}

/// Configuration for connection pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Maximum number of idle connections kept by the pool
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// How often the sweeper probes one idle connection (milliseconds)
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
    /// Read deadline used by the liveness probe (milliseconds)
    #[serde(default = "default_probe_deadline_ms")]
    pub probe_deadline_ms: u64,
    #[serde(default)]
    pub unsolicited_data: UnsolicitedDataPolicy,
}

fn default_capacity() -> usize {
    32
}

fn default_sweep_interval_ms() -> u64 {
    10
}

fn default_probe_deadline_ms() -> u64 {
    5
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            sweep_interval_ms: default_sweep_interval_ms(),
            probe_deadline_ms: default_probe_deadline_ms(),
            unsolicited_data: UnsolicitedDataPolicy::default(),
        }
    }
}

impl PoolConfig {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn probe_deadline(&self) -> Duration {
        Duration::from_millis(self.probe_deadline_ms)
    }

    pub fn validate(&self) -> Result<(), PoolError> {
        if self.capacity == 0 {
            return Err(PoolError::InvalidConfiguration(
                "capacity must be a positive number".to_string(),
            ));
        }

        if self.sweep_interval_ms == 0 {
            return Err(PoolError::InvalidConfiguration(
                "sweep_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.probe_deadline_ms == 0 {
            return Err(PoolError::InvalidConfiguration(
                "probe_deadline_ms must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
