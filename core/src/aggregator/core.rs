use std::mem;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::aggregator::config::{AggregatorConfig, FlushPolicy};
use crate::aggregator::dispatch::{dispatch, CompletionListener, DispatchContext, DispatchPool};
use crate::record::container::solo_size;
use crate::record::{AggregationError, Container, UserRecord};
use crate::telemetry::AggregatorCounters;

/// Observable aggregator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatorState {
    Empty,
    Accumulating,
}

/// Packs user records into containers, rotating when one fills up.
///
/// Single writer: mutate from one thread (or behind a mutex). Listener
/// invocations run on their bound `DispatchContext` and may overlap with
/// later calls on the same aggregator.
pub struct Aggregator {
    config: AggregatorConfig,
    current: Container,
    // completed containers retained under FlushPolicy::Accumulate
    pending: Vec<Arc<Container>>,
    listeners: Vec<(Arc<dyn CompletionListener>, DispatchContext)>,
    shared_pool: Option<DispatchPool>,
    counters: AggregatorCounters,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregator {
    pub fn new() -> Self {
        let config = AggregatorConfig::default();
        Self::build(config)
    }

    pub fn with_config(config: AggregatorConfig) -> Result<Self, AggregationError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: AggregatorConfig) -> Self {
        Self {
            current: Container::with_max_bytes(config.max_container_bytes),
            config,
            pending: Vec::new(),
            listeners: Vec::new(),
            shared_pool: None,
            counters: AggregatorCounters::default(),
        }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Add one record.
    ///
    /// Returns `Ok(Some(completed))` when the record did not fit and the
    /// current container was rotated out; `completed` is also dispatched to
    /// every listener. The record always ends up in the (new) current container
    /// on success.
    pub fn add_user_record(
        &mut self,
        partition_key: &str,
        explicit_hash_key: Option<&str>,
        data: impl Into<Bytes>,
    ) -> Result<Option<Arc<Container>>, AggregationError> {
        let data = data.into();
        let data_len = data.len();

        match self.current.add_user_record(partition_key, explicit_hash_key, data.clone()) {
            Ok(true) => {
                self.counters.add_record(data_len);
                return Ok(None);
            }
            Ok(false) => {}
            Err(e) => {
                self.counters.add_rejected();
                return Err(e);
            }
        }

        let completed = self.rotate();
        let retried = self.current.add_user_record(partition_key, explicit_hash_key, data);
        self.emit(&completed);

        match retried {
            Ok(true) => {
                self.counters.add_record(data_len);
                Ok(Some(completed))
            }
            // unreachable: a fresh container reports oversize records as errors
            Ok(false) => {
                self.counters.add_rejected();
                Err(AggregationError::CapacityExceeded {
                    partition_key: partition_key.to_owned(),
                    explicit_hash_key: explicit_hash_key.unwrap_or_default().to_owned(),
                    size: solo_size(partition_key, explicit_hash_key, data_len),
                    max: self.current.max_bytes(),
                })
            }
            Err(e) => {
                self.counters.add_rejected();
                Err(e)
            }
        }
    }

    pub fn add(&mut self, record: &UserRecord) -> Result<Option<Arc<Container>>, AggregationError> {
        self.add_user_record(record.partition_key(), record.explicit_hash_key(), record.data().clone())
    }

    /// Feed `records` in order, handing every rotated container to `sink`.
    ///
    /// Stops at the first error; records before it stay aggregated. Returns
    /// the number of records added.
    pub fn add_all<I, F>(&mut self, records: I, mut sink: F) -> Result<usize, AggregationError>
    where
        I: IntoIterator<Item = UserRecord>,
        F: FnMut(Arc<Container>),
    {
        let mut added = 0;
        for record in records {
            if let Some(completed) = self.add(&record)? {
                sink(completed);
            }
            added += 1;
        }
        Ok(added)
    }

    /// Register `listener` on the aggregator's shared pool.
    ///
    /// Returns `false` if this exact listener (same `Arc`) is already registered.
    pub fn on_complete(&mut self, listener: Arc<dyn CompletionListener>) -> bool {
        self.on_complete_with(listener, DispatchContext::Shared)
    }

    pub fn on_complete_with(&mut self, listener: Arc<dyn CompletionListener>, context: DispatchContext) -> bool {
        let duplicate = self
            .listeners
            .iter()
            .any(|(existing, _)| same_listener(existing, &listener));
        if duplicate {
            return false;
        }
        debug!(context = ?context, "listener registered");
        self.listeners.push((listener, context));
        true
    }

    pub fn clear_listeners(&mut self) {
        self.listeners.clear();
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Take the current container if non-empty, leaving a fresh one.
    /// Listeners are not invoked.
    pub fn clear_and_get(&mut self) -> Option<Container> {
        if self.current.is_empty() {
            return None;
        }
        let fresh = Container::with_max_bytes(self.config.max_container_bytes);
        let out = mem::replace(&mut self.current, fresh);
        self.counters.add_flush(out.size_bytes());
        debug!(records = out.num_records(), bytes = out.size_bytes(), "flushed current container");
        Some(out)
    }

    /// Every retained container, then the current one if non-empty.
    /// The aggregator is empty afterwards. Listeners are not invoked.
    pub fn drain(&mut self) -> Vec<Arc<Container>> {
        let mut out = mem::take(&mut self.pending);
        if let Some(current) = self.clear_and_get() {
            out.push(Arc::new(current));
        }
        out
    }

    pub fn num_user_records(&self) -> usize {
        self.current.num_records()
    }

    /// Serialized size of the current container.
    pub fn size_bytes(&self) -> usize {
        self.current.size_bytes()
    }

    /// Retained containers plus the current one if non-empty.
    pub fn num_containers(&self) -> usize {
        self.pending.len() + usize::from(!self.current.is_empty())
    }

    pub fn current(&self) -> &Container {
        &self.current
    }

    pub fn state(&self) -> AggregatorState {
        if self.current.is_empty() {
            AggregatorState::Empty
        } else {
            AggregatorState::Accumulating
        }
    }

    pub fn counters(&self) -> &AggregatorCounters {
        &self.counters
    }

    fn rotate(&mut self) -> Arc<Container> {
        let fresh = Container::with_max_bytes(self.config.max_container_bytes);
        let completed = Arc::new(mem::replace(&mut self.current, fresh));
        self.counters.add_rotation(completed.size_bytes());
        debug!(
            records = completed.num_records(),
            bytes = completed.size_bytes(),
            partition_key = completed.partition_key().unwrap_or_default(),
            "container rotated"
        );
        if self.config.flush_policy == FlushPolicy::Accumulate {
            self.pending.push(Arc::clone(&completed));
        }
        completed
    }

    fn emit(&mut self, completed: &Arc<Container>) {
        if self.listeners.is_empty() {
            return;
        }
        let needs_shared = self
            .listeners
            .iter()
            .any(|(_, ctx)| matches!(ctx, DispatchContext::Shared));
        let shared = if needs_shared { self.shared_pool() } else { None };

        for (listener, context) in &self.listeners {
            match (context, &shared) {
                (DispatchContext::Shared, Some(pool)) => {
                    dispatch(&DispatchContext::Pool(pool.clone()), listener, completed)
                }
                _ => dispatch(context, listener, completed),
            }
        }
        self.counters.add_dispatches(self.listeners.len());
    }

    /// Lazily started default pool. `None` if its threads cannot be spawned,
    /// in which case shared listeners run inline.
    fn shared_pool(&mut self) -> Option<DispatchPool> {
        if self.shared_pool.is_none() {
            match DispatchPool::new(self.config.dispatch_workers) {
                Ok(pool) => self.shared_pool = Some(pool),
                Err(e) => warn!(error = %e, "failed to start dispatch pool; running listeners inline"),
            }
        }
        self.shared_pool.clone()
    }
}

#[inline]
fn same_listener(a: &Arc<dyn CompletionListener>, b: &Arc<dyn CompletionListener>) -> bool {
    // compare data pointers only; vtable pointers may differ across codegen units
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}
