//! kinesis-agg-core
//!
//! Pure Rust record aggregation / deaggregation engine.
//! Packs many small keyed records into size-bounded aggregated records and
//! unpacks them on receipt. No network, no filesystem.

#![forbid(unsafe_code)]

// Shared and top level
pub mod constants;
pub mod types;
pub mod digest;

// Codec layers
pub mod wire;
pub mod record;

// Producer / consumer surfaces
pub mod aggregator;
pub mod deagg;
pub mod batch;
pub mod telemetry;

// -----------------------------------------------------------------------------
// Prelude (Rust users)
// -----------------------------------------------------------------------------
pub mod prelude {
    pub use crate::aggregator::{
        Aggregator, AggregatorConfig, AggregatorState, CompletionListener, DispatchContext, DispatchPool,
        FlushPolicy,
    };
    pub use crate::batch::{group_containers, group_entries, Batcher, TransportEntry};
    pub use crate::deagg::{deaggregate, decode, decode_all, DeaggregatedRecord, DeaggregationError, Deaggregator, Envelope};
    pub use crate::digest::derive_explicit_hash_key;
    pub use crate::record::{AggregationError, Container, UserRecord, ValidationError};
    pub use crate::types::AggError;
}
