//! record: user records, key tables and the accumulating container.
//!
//! Responsibilities:
//! - Validate user records before any mutation
//! - Deduplicate partition / explicit hash keys with stable indices
//! - Track the encoded size incrementally, exactly matching the wire encoding
//!
//! Non-responsibilities:
//! - Rotation and listener dispatch (see `aggregator`)
//! - Decoding received blobs (see `deagg`)

pub mod types;
pub mod validate;
pub mod key_table;
pub mod container;

pub use types::{AggregationError, UserRecord, ValidationError};
pub use key_table::{KeySlot, KeyTable};
pub use container::Container;
