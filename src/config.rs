//! Runtime configuration for an index instance.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, IndexResult};

/// Default promotion probability, 1/e.
pub const DEFAULT_PROMOTION_PROBABILITY: f64 = 0.367_879_441_171_442_3;

/// Tunables for positioning, promotion and scans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Bounded queue size between a scan producer and its consumer.
    pub scan_queue_capacity: usize,
    /// Probability that a freshly placed node is promoted one level up.
    pub promotion_probability: f64,
    /// Seed for the promotion coin. `None` seeds from the OS.
    pub promotion_seed: Option<u64>,
    /// Upper bound on a single lock wait. `None` waits forever.
    pub lock_wait_timeout_ms: Option<u64>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            scan_queue_capacity: 256,
            promotion_probability: DEFAULT_PROMOTION_PROBABILITY,
            promotion_seed: None,
            lock_wait_timeout_ms: None,
        }
    }
}

impl IndexConfig {
    pub fn from_json(text: &str) -> IndexResult<Self> {
        let config: IndexConfig =
            serde_json::from_str(text).map_err(|e| IndexError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> IndexResult<()> {
        if self.scan_queue_capacity == 0 {
            return Err(IndexError::Config(
                "scan_queue_capacity must be at least 1".into(),
            ));
        }

        if !(self.promotion_probability > 0.0 && self.promotion_probability < 1.0) {
            return Err(IndexError::Config(format!(
                "promotion_probability must be in (0, 1), got {}",
                self.promotion_probability
            )));
        }

        Ok(())
    }

    pub fn lock_wait_timeout(&self) -> Option<Duration> {
        self.lock_wait_timeout_ms.map(Duration::from_millis)
    }
}
