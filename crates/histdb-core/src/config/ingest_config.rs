use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::defaults;

/// Retry and fetch behaviour of the ingestion coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Retries after the first attempt for transient failures.
    pub num_retries: u32,
    /// Fixed delay between attempts.
    pub retry_delay_ms: u64,
    /// How long to wait for the next unit from a source before ending the iteration.
    pub fetch_timeout_ms: u64,
    pub channel_capacity: usize,
}

impl IngestConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            num_retries: defaults::DEFAULT_NUM_RETRIES,
            retry_delay_ms: defaults::DEFAULT_RETRY_DELAY_MS,
            fetch_timeout_ms: defaults::DEFAULT_FETCH_TIMEOUT_MS,
            channel_capacity: defaults::DEFAULT_CHANNEL_CAPACITY,
        }
    }
}
