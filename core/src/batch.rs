//! Grouping of serialized containers into transport requests.
//!
//! One request carries at most `MAX_ENTRIES_PER_BATCH` entries and
//! `MAX_BYTES_PER_BATCH` bytes, counting each entry's data and partition key.

use std::sync::Arc;

use bytes::Bytes;
use tracing::trace;

use crate::constants::{MAX_BYTES_PER_BATCH, MAX_ENTRIES_PER_BATCH};
use crate::record::Container;

/// One record as handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEntry {
    pub partition_key: String,
    pub explicit_hash_key: Option<String>,
    pub data: Bytes,
}

impl TransportEntry {
    /// Bytes this entry counts against a batch.
    #[inline]
    pub fn billed_bytes(&self) -> usize {
        self.data.len() + self.partition_key.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    pub max_entries: usize,
    pub max_bytes: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            max_entries: MAX_ENTRIES_PER_BATCH,
            max_bytes: MAX_BYTES_PER_BATCH,
        }
    }
}

/// Order-preserving batcher.
///
/// Entries are appended to the open batch until the next one would break a
/// limit; then the open batch is closed and a new one started. An entry larger
/// than `max_bytes` on its own still gets a batch to itself.
#[derive(Debug, Default)]
pub struct Batcher {
    limits: BatchLimits,
    open: Vec<TransportEntry>,
    open_bytes: usize,
    closed: Vec<Vec<TransportEntry>>,
}

impl Batcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: BatchLimits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    pub fn push(&mut self, entry: TransportEntry) {
        let bytes = entry.billed_bytes();
        let over_count = self.open.len() + 1 > self.limits.max_entries;
        let over_bytes = self.open_bytes + bytes > self.limits.max_bytes;
        if !self.open.is_empty() && (over_count || over_bytes) {
            self.close_open();
        }
        self.open_bytes += bytes;
        self.open.push(entry);
    }

    /// Serialize `container` and push it; empty containers are skipped.
    pub fn push_container(&mut self, container: &Container) {
        if let Some(entry) = container.to_transport_entry() {
            self.push(entry);
        }
    }

    /// Batches completed so far, excluding the open one.
    pub fn take_closed(&mut self) -> Vec<Vec<TransportEntry>> {
        std::mem::take(&mut self.closed)
    }

    /// Every batch, including the open one if non-empty.
    pub fn finish(mut self) -> Vec<Vec<TransportEntry>> {
        if !self.open.is_empty() {
            self.close_open();
        }
        self.closed
    }

    fn close_open(&mut self) {
        trace!(entries = self.open.len(), bytes = self.open_bytes, "batch closed");
        self.closed.push(std::mem::take(&mut self.open));
        self.open_bytes = 0;
    }
}

/// Group `entries` into batches under the default limits, preserving order.
pub fn group_entries<I>(entries: I) -> Vec<Vec<TransportEntry>>
where
    I: IntoIterator<Item = TransportEntry>,
{
    let mut batcher = Batcher::new();
    for entry in entries {
        batcher.push(entry);
    }
    batcher.finish()
}

/// Serialize and group completed containers, skipping empty ones.
pub fn group_containers<'a, I>(containers: I) -> Vec<Vec<TransportEntry>>
where
    I: IntoIterator<Item = &'a Arc<Container>>,
{
    let mut batcher = Batcher::new();
    for container in containers {
        batcher.push_container(container);
    }
    batcher.finish()
}
