use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use crossbeam::channel::{unbounded, Receiver, Sender};
use tracing::{debug, trace, warn};

use crate::record::Container;

/// Receives completed containers after a rotation.
pub trait CompletionListener: Send + Sync {
    fn on_complete(&self, container: Arc<Container>);
}

impl<F> CompletionListener for F
where
    F: Fn(Arc<Container>) + Send + Sync,
{
    fn on_complete(&self, container: Arc<Container>) {
        self(container)
    }
}

/// Where a listener invocation runs.
#[derive(Clone, Default)]
pub enum DispatchContext {
    /// The aggregator's own pool, created on first use.
    #[default]
    Shared,
    /// Synchronously on the thread that triggered the rotation.
    Inline,
    /// A new thread per invocation.
    Thread,
    /// A caller-owned pool, possibly shared across aggregators.
    Pool(DispatchPool),
}

impl fmt::Debug for DispatchContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchContext::Shared => f.write_str("Shared"),
            DispatchContext::Inline => f.write_str("Inline"),
            DispatchContext::Thread => f.write_str("Thread"),
            DispatchContext::Pool(pool) => f.debug_tuple("Pool").field(&pool.workers()).finish(),
        }
    }
}

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size worker pool fed by an unbounded crossbeam channel.
///
/// Clones share the same workers. Workers exit once every clone is dropped
/// and the queue has drained.
#[derive(Clone)]
pub struct DispatchPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    tx: Sender<Job>,
    workers: usize,
}

impl DispatchPool {
    /// Spawn `workers` threads (at least one).
    pub fn new(workers: usize) -> std::io::Result<Self> {
        let workers = workers.max(1);
        let (tx, rx) = unbounded::<Job>();

        for i in 0..workers {
            let rx = rx.clone();
            thread::Builder::new()
                .name(format!("agg-dispatch-{}", i))
                .spawn(move || run_dispatch_worker(i, rx))?;
        }
        debug!(workers, "dispatch pool started");

        Ok(Self {
            inner: Arc::new(PoolInner { tx, workers }),
        })
    }

    #[inline]
    pub fn workers(&self) -> usize {
        self.inner.workers
    }

    /// Queue `job`. Never blocks.
    pub fn submit<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.inner.tx.send(Box::new(job)).is_err() {
            // only possible once every worker has exited
            warn!("dispatch pool has no live workers; job dropped");
        }
    }
}

/// Single dispatch worker loop
fn run_dispatch_worker(id: usize, rx: Receiver<Job>) {
    trace!(worker = id, "dispatch worker up");
    while let Ok(job) = rx.recv() {
        guarded(job);
    }
    trace!(worker = id, "dispatch worker exiting");
}

/// Run one listener job, logging instead of unwinding if it panics.
fn guarded<F: FnOnce()>(job: F) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
        warn!(reason = panic_message(payload.as_ref()), "completion listener panicked");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}

/// Hand `container` to `listener` on `context`.
///
/// `Shared` must be resolved to a concrete pool by the caller; if it reaches
/// here it runs inline.
pub(crate) fn dispatch(
    context: &DispatchContext,
    listener: &Arc<dyn CompletionListener>,
    container: &Arc<Container>,
) {
    let listener = Arc::clone(listener);
    let container = Arc::clone(container);
    match context {
        DispatchContext::Inline | DispatchContext::Shared => {
            guarded(move || listener.on_complete(container));
        }
        DispatchContext::Thread => {
            let spawned = thread::Builder::new()
                .name("agg-dispatch-oneshot".into())
                .spawn(move || guarded(move || listener.on_complete(container)));
            if let Err(e) = spawned {
                warn!(error = %e, "failed to spawn dispatch thread; listener skipped");
            }
        }
        DispatchContext::Pool(pool) => {
            pool.submit(move || listener.on_complete(container));
        }
    }
}
