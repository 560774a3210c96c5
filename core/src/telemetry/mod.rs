//! telemetry/mod.rs
//! Counters kept by the aggregator and deaggregator, plus serializable snapshots.

pub mod counters;
pub mod snapshot;

pub use counters::*;
pub use snapshot::*;
