//! telemetry/counters.rs
//! Plain counters kept by the aggregator and the deaggregator.
//!
//! Owned by a single writer, so no atomics; merge per-thread copies with
//! `merge` or `+=`.

use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

#[derive(Default, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatorCounters {
    pub records_added: u64,
    pub records_rejected: u64,
    pub bytes_user_data: u64,
    /// Containers rotated out because they were full.
    pub containers_rotated: u64,
    /// Containers handed out by `clear_and_get` / `drain`.
    pub containers_flushed: u64,
    /// Serialized bytes of every rotated or flushed container.
    pub bytes_emitted: u64,
    pub listener_dispatches: u64,
}

impl AggregatorCounters {
    pub fn add_record(&mut self, data_len: usize) {
        self.records_added += 1;
        self.bytes_user_data += data_len as u64;
    }

    pub fn add_rejected(&mut self) {
        self.records_rejected += 1;
    }

    pub fn add_rotation(&mut self, container_bytes: usize) {
        self.containers_rotated += 1;
        self.bytes_emitted += container_bytes as u64;
    }

    pub fn add_flush(&mut self, container_bytes: usize) {
        self.containers_flushed += 1;
        self.bytes_emitted += container_bytes as u64;
    }

    pub fn add_dispatches(&mut self, n: usize) {
        self.listener_dispatches += n as u64;
    }

    pub fn containers_emitted(&self) -> u64 {
        self.containers_rotated + self.containers_flushed
    }

    /// User payload bytes per emitted byte; 0.0 before anything is emitted.
    pub fn payload_ratio(&self) -> f64 {
        if self.bytes_emitted == 0 {
            0.0
        } else {
            self.bytes_user_data as f64 / self.bytes_emitted as f64
        }
    }

    pub fn merge(&mut self, other: &AggregatorCounters) {
        self.records_added += other.records_added;
        self.records_rejected += other.records_rejected;
        self.bytes_user_data += other.bytes_user_data;
        self.containers_rotated += other.containers_rotated;
        self.containers_flushed += other.containers_flushed;
        self.bytes_emitted += other.bytes_emitted;
        self.listener_dispatches += other.listener_dispatches;
    }
}

impl AddAssign for AggregatorCounters {
    fn add_assign(&mut self, rhs: Self) {
        self.merge(&rhs);
    }
}

#[derive(Default, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeaggregatorCounters {
    pub envelopes_aggregated: u64,
    pub envelopes_passthrough: u64,
    pub records_emitted: u64,
    pub checksum_failures: u64,
    pub decode_failures: u64,
    pub bytes_received: u64,
}

impl DeaggregatorCounters {
    pub fn add_aggregated(&mut self, envelope_len: usize, records: usize) {
        self.envelopes_aggregated += 1;
        self.bytes_received += envelope_len as u64;
        self.records_emitted += records as u64;
    }

    pub fn add_passthrough(&mut self, envelope_len: usize) {
        self.envelopes_passthrough += 1;
        self.bytes_received += envelope_len as u64;
        self.records_emitted += 1;
    }

    pub fn add_checksum_failure(&mut self, envelope_len: usize) {
        self.checksum_failures += 1;
        self.bytes_received += envelope_len as u64;
    }

    pub fn add_decode_failure(&mut self, envelope_len: usize) {
        self.decode_failures += 1;
        self.bytes_received += envelope_len as u64;
    }

    pub fn envelopes(&self) -> u64 {
        self.envelopes_aggregated + self.envelopes_passthrough + self.checksum_failures + self.decode_failures
    }

    pub fn merge(&mut self, other: &DeaggregatorCounters) {
        self.envelopes_aggregated += other.envelopes_aggregated;
        self.envelopes_passthrough += other.envelopes_passthrough;
        self.records_emitted += other.records_emitted;
        self.checksum_failures += other.checksum_failures;
        self.decode_failures += other.decode_failures;
        self.bytes_received += other.bytes_received;
    }
}

impl AddAssign for DeaggregatorCounters {
    fn add_assign(&mut self, rhs: Self) {
        self.merge(&rhs);
    }
}
