//! aggregator: the stateful packing manager.
//!
//! Responsibilities:
//! - Own exactly one live `Container` and rotate it when a record does not fit
//! - Dispatch completed containers to listeners on their bound context
//! - Retain completed containers under `FlushPolicy::Accumulate`
//!
//! Non-responsibilities:
//! - Byte layout and size accounting (see `record`, `wire`)
//! - Shipping containers anywhere (see `batch` for request grouping)

pub mod config;
pub mod dispatch;
pub mod core;

pub use config::{AggregatorConfig, FlushPolicy};
pub use dispatch::{CompletionListener, DispatchContext, DispatchPool};
pub use self::core::{Aggregator, AggregatorState};
