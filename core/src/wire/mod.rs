//! Wire layer for aggregated records.
//!
//! Responsibilities:
//! - Size varints without encoding them (incremental size accounting)
//! - Encode key tables and inner records into the Protocol-Buffers-compatible body
//! - Frame a body as `magic | body | md5(body)`
//! - Decode a body back into borrowed views with strict validation
//!
//! Non-responsibilities:
//! - Key validation and capacity decisions
//! - Listener dispatch
//! - Transport

pub mod types;
pub mod varint;
pub mod encode;
pub mod decode;

pub use types::{
    AggregatedView,
    InnerRecord,
    InnerRecordView,
    WireError,
};
pub use varint::varint_len;
pub use encode::{encode_body, encoded_body_len, frame_body, inner_record_len};
pub use decode::{decode_body, split_framed, FramedView};
