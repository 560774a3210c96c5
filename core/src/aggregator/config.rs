use serde::{Deserialize, Serialize};

use crate::constants::{FRAMING_OVERHEAD, MAX_RECORD_BYTES};
use crate::record::AggregationError;

/// What happens to a container when it rotates out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushPolicy {
    /// Hand the completed container to listeners right away.
    #[default]
    Immediate,
    /// Keep completed containers until `Aggregator::drain`; listeners still fire.
    Accumulate,
}

/// Aggregator settings.
///
/// Every field has a default, so a JSON document may name any subset:
///
/// ```json
/// { "max_container_bytes": 262144, "flush_policy": "accumulate" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Cap on one serialized container, framing included.
    pub max_container_bytes: usize,
    pub flush_policy: FlushPolicy,
    /// Worker threads of the shared pool used by `DispatchContext::Pool`.
    pub dispatch_workers: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            max_container_bytes: MAX_RECORD_BYTES,
            flush_policy: FlushPolicy::Immediate,
            dispatch_workers: num_cpus::get().max(1),
        }
    }
}

impl AggregatorConfig {
    pub fn with_max_container_bytes(mut self, max: usize) -> Self {
        self.max_container_bytes = max;
        self
    }

    pub fn with_flush_policy(mut self, policy: FlushPolicy) -> Self {
        self.flush_policy = policy;
        self
    }

    pub fn with_dispatch_workers(mut self, workers: usize) -> Self {
        self.dispatch_workers = workers;
        self
    }

    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self, AggregationError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| AggregationError::Config(format!("malformed config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AggregationError> {
        if self.max_container_bytes <= FRAMING_OVERHEAD {
            return Err(AggregationError::Config(format!(
                "max_container_bytes must exceed the {} byte framing, got {}",
                FRAMING_OVERHEAD, self.max_container_bytes
            )));
        }
        if self.max_container_bytes > MAX_RECORD_BYTES {
            return Err(AggregationError::Config(format!(
                "max_container_bytes must be at most {}, got {}",
                MAX_RECORD_BYTES, self.max_container_bytes
            )));
        }
        if self.dispatch_workers == 0 {
            return Err(AggregationError::Config("dispatch_workers must be at least 1".into()));
        }
        Ok(())
    }
}
