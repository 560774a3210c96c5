//! telemetry/snapshot.rs
//! Immutable, serializable view of aggregator counters over a time window.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::telemetry::counters::AggregatorCounters;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationSnapshot {
    pub taken_at: DateTime<Utc>,
    pub counters: AggregatorCounters,
    pub elapsed: Duration,
    pub records_per_container: f64,
    pub payload_ratio: f64,
    pub records_per_sec: f64,
}

impl AggregationSnapshot {
    pub fn from(counters: &AggregatorCounters, elapsed: Duration) -> Self {
        let emitted = counters.containers_emitted();
        let records_per_container = if emitted > 0 {
            counters.records_added as f64 / emitted as f64
        } else {
            0.0
        };
        let records_per_sec = if elapsed.as_secs_f64() > 0.0 {
            counters.records_added as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        Self {
            taken_at: Utc::now(),
            counters: counters.clone(),
            elapsed,
            records_per_container,
            payload_ratio: counters.payload_ratio(),
            records_per_sec,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
