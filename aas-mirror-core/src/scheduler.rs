//! Variable-rate scheduler.
//!
//! One logical clock dispatches the pool of "poll this source" tasks: at every
//! tick the entire ready queue is drained into a batch and each task in the
//! batch is submitted for concurrent execution. A task re-enters the ready
//! queue only after its run completes, so at most one poll per source is ever
//! in flight and a slow or unreachable source cannot delay the others' next
//! poll. Ticks are time-driven: the next tick is scheduled after the
//! configured delay whether or not the current batch has finished, and the
//! interval is read freshly from the config accessor on every iteration.
//!
//! Deregistration is soft. A deregistered task is never interrupted: if it is
//! mid-run it finishes normally and is discarded instead of re-queued; if it
//! is waiting in the ready queue it is filtered out at the next drain. Either
//! way its [`PollTask::shutdown`] hook runs exactly once so the source can
//! remove the catalog entries attributed to it.

use std::collections::{HashSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::pipeline::panic_message;

/// One repeatedly scheduled unit of work: a poll of one registered source.
#[async_trait]
pub trait PollTask: Send {
    /// Stable task id; deregistration refers to it.
    fn id(&self) -> &str;

    /// One poll cycle. Expected failures belong in the task's own pipeline
    /// result; a panic is caught, logged, and the task is re-queued anyway.
    async fn run(&mut self);

    /// Called exactly once when the task is discarded after deregistration.
    async fn shutdown(&mut self);
}

struct Shared {
    /// FIFO queue of tasks ready for the next iteration.
    ready: Mutex<VecDeque<Box<dyn PollTask>>>,
    /// Ids deregistered since their task last completed.
    removed: Mutex<HashSet<String>>,
    stopped: AtomicBool,
    /// Wakes the tick loop early when the scheduler is stopped.
    stop_signal: Notify,
}

/// Dispatches registered poll tasks at a configurable, mutable rate.
pub struct Scheduler {
    shared: Arc<Shared>,
    interval: Arc<dyn Fn() -> Duration + Send + Sync>,
}

impl Scheduler {
    /// `interval` is consulted on every tick, so a changed configuration value
    /// takes effect without a restart.
    pub fn new(interval: impl Fn() -> Duration + Send + Sync + 'static) -> Self {
        Self {
            shared: Arc::new(Shared {
                ready: Mutex::new(VecDeque::new()),
                removed: Mutex::new(HashSet::new()),
                stopped: AtomicBool::new(false),
                stop_signal: Notify::new(),
            }),
            interval: Arc::new(interval),
        }
    }

    /// Append a task to the ready queue; it runs in the next batch.
    pub fn register(&self, task: Box<dyn PollTask>) {
        let id = task.id().to_string();
        self.shared.removed.lock().unwrap().remove(&id);
        self.shared.ready.lock().unwrap().push_back(task);
        debug!(task = %id, "task registered, ready for next iteration");
    }

    /// Prevent future scheduling of the task with this id. An in-flight run
    /// finishes normally and is then discarded; callers must tolerate one more
    /// completed poll after deregistration returns.
    pub fn deregister(&self, id: &str) {
        self.shared.removed.lock().unwrap().insert(id.to_string());
        debug!(task = %id, "task deregistered");
    }

    /// Stop scheduling new batches. In-flight tasks are allowed to finish.
    pub fn stop(&self) {
        self.shared.stopped.store(true, Ordering::SeqCst);
        // notify_one stores a permit, so a stop that lands between ticks still
        // wakes the very next sleep.
        self.shared.stop_signal.notify_one();
        info!("scheduler stopped; no further batches will be scheduled");
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::SeqCst)
    }

    /// Spawn the tick loop onto the current runtime.
    pub fn start(&self) -> JoinHandle<()> {
        let shared = Arc::clone(&self.shared);
        let interval = Arc::clone(&self.interval);
        tokio::spawn(async move {
            loop {
                if shared.stopped.load(Ordering::SeqCst) {
                    break;
                }

                let batch = drain_ready(&shared).await;
                debug!(batch_size = batch.len(), "dispatching batch");
                for task in batch {
                    let shared = Arc::clone(&shared);
                    tokio::spawn(run_one(shared, task));
                }

                // Time-driven: the next tick comes after the configured delay,
                // not when the batch finishes. stop() wakes the loop early.
                let delay = interval();
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shared.stop_signal.notified() => {}
                }
            }
        })
    }
}

/// Drain the whole ready queue into a batch, discarding deregistered tasks.
async fn drain_ready(shared: &Arc<Shared>) -> Vec<Box<dyn PollTask>> {
    let drained: Vec<Box<dyn PollTask>> = {
        let mut ready = shared.ready.lock().unwrap();
        ready.drain(..).collect()
    };
    let mut batch = Vec::with_capacity(drained.len());
    for mut task in drained {
        let discard = {
            let mut removed = shared.removed.lock().unwrap();
            removed.take(task.id()).is_some()
        };
        if discard {
            debug!(task = %task.id(), "discarding deregistered task from ready queue");
            task.shutdown().await;
        } else {
            batch.push(task);
        }
    }
    batch
}

/// Run one task to completion, then re-queue it unless deregistered meanwhile.
async fn run_one(shared: Arc<Shared>, mut task: Box<dyn PollTask>) {
    let id = task.id().to_string();
    if let Err(panic) = AssertUnwindSafe(task.run()).catch_unwind().await {
        // The source gets another chance next cycle.
        error!(task = %id, message = %panic_message(&*panic), "poll task panicked");
    }

    let discard = {
        let mut removed = shared.removed.lock().unwrap();
        removed.take(id.as_str()).is_some()
    };
    if discard {
        debug!(task = %id, "discarding deregistered task after its final run");
        task.shutdown().await;
    } else {
        shared.ready.lock().unwrap().push_back(task);
    }
}
