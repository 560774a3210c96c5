//! deagg: turn received envelopes back into user records.
//!
//! Responsibilities:
//! - Detect aggregated payloads by magic prefix; pass everything else through
//! - Verify the trailing MD5 before trusting the body
//! - Resolve key-table indices and assign sub-sequence numbers
//!
//! Decoding is pure: safe to run concurrently on independent envelopes.

pub mod types;
pub mod decode;

pub use types::{DeaggregatedRecord, DeaggregationError, Envelope};
pub use decode::{deaggregate, decode, decode_all, Deaggregator, Records};
