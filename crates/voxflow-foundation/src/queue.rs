//! # Single-worker speak task queue
//!
//! A FIFO queue of opaque work items executed strictly in submission order
//! on one dedicated worker thread. Supports lazy start, purging pending
//! tasks without stopping the worker, waiting until the queue drains, and
//! an idempotent cancel that joins the worker.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::QueueError;

/// One unit of work. Whatever it captures is dropped if the task is
/// discarded by a purge or cancel before it runs.
pub type QueueTask = Box<dyn FnOnce() + Send + 'static>;

/// Result of waiting for the queue to drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Pending list empty and no task executing at the moment of the check.
    Done,
    /// The timeout elapsed first.
    TimedOut,
}

struct QueueInner {
    pending: VecDeque<QueueTask>,
    cancel: bool,
    /// A task is executing right now. The queue counts as non-empty while
    /// this is set even if `pending` is empty.
    busy: bool,
}

impl QueueInner {
    fn is_drained(&self) -> bool {
        self.pending.is_empty() && !self.busy
    }
}

struct QueueShared {
    inner: Mutex<QueueInner>,
    /// Signaled on submit and on cancel; the worker waits here between tasks.
    work: Condvar,
    /// Signaled whenever the queue transitions to drained.
    idle: Condvar,
}

struct Worker {
    shared: Arc<QueueShared>,
    handle: JoinHandle<()>,
}

/// Strictly-ordered FIFO queue with exactly one consumer thread.
///
/// All submitted tasks run sequentially on the worker; callers never
/// execute task bodies themselves. Dropping the queue cancels it and joins
/// the worker.
pub struct TaskQueue {
    worker: Mutex<Option<Worker>>,
    thread_name: String,
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::named("task-queue")
    }

    /// Queue whose worker thread carries the given name.
    pub fn named(thread_name: impl Into<String>) -> Self {
        Self {
            worker: Mutex::new(None),
            thread_name: thread_name.into(),
        }
    }

    /// Spawn the worker and block until it is listening. Idempotent: a
    /// second call returns Ok without touching the running worker. On
    /// failure no partial state survives; the queue is as if `start` was
    /// never called.
    pub fn start(&self) -> Result<(), QueueError> {
        self.ensure_started().map(|_| ())
    }

    fn ensure_started(&self) -> Result<Arc<QueueShared>, QueueError> {
        let mut slot = self.worker.lock();
        if let Some(worker) = slot.as_ref() {
            return Ok(worker.shared.clone());
        }

        let shared = Arc::new(QueueShared {
            inner: Mutex::new(QueueInner {
                pending: VecDeque::new(),
                cancel: false,
                busy: false,
            }),
            work: Condvar::new(),
            idle: Condvar::new(),
        });

        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<()>(1);
        let worker_shared = shared.clone();
        let handle = thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || worker_loop(worker_shared, ready_tx))
            .map_err(|e| QueueError::ThreadSpawn(e.to_string()))?;

        // The worker sends once it holds the queue lock and is about to
        // listen; a disconnect means it died during startup.
        if ready_rx.recv().is_err() {
            let _ = handle.join();
            return Err(QueueError::WorkerInit);
        }

        *slot = Some(Worker {
            shared: shared.clone(),
            handle,
        });
        Ok(shared)
    }

    /// Append a task to the tail of the queue, starting the worker first if
    /// needed. Never blocks on task execution.
    pub fn submit(&self, task: QueueTask) -> Result<(), QueueError> {
        let shared = self.ensure_started()?;
        let mut inner = shared.inner.lock();
        inner.pending.push_back(task);
        shared.work.notify_one();
        Ok(())
    }

    /// Discard every pending task without stopping the worker. A task
    /// already executing is unaffected; its captures are its own.
    pub fn purge_pending(&self) {
        let Some(shared) = self.shared() else {
            return;
        };
        let mut inner = shared.inner.lock();
        let discarded = inner.pending.len();
        inner.pending.clear();
        if !inner.busy {
            shared.idle.notify_all();
        }
        drop(inner);
        if discarded > 0 {
            tracing::debug!(discarded, "purged pending tasks");
        }
    }

    /// Block until the pending list is empty and no task is executing, or
    /// until `timeout` elapses (`None` waits indefinitely). Says nothing
    /// about tasks submitted after the call returns.
    pub fn wait_until_empty(&self, timeout: Option<Duration>) -> WaitOutcome {
        let Some(shared) = self.shared() else {
            // Never started: trivially empty.
            return WaitOutcome::Done;
        };
        let mut inner = shared.inner.lock();
        match timeout {
            None => {
                while !inner.is_drained() {
                    shared.idle.wait(&mut inner);
                }
                WaitOutcome::Done
            }
            Some(timeout) => {
                let deadline = Instant::now() + timeout;
                while !inner.is_drained() {
                    if shared.idle.wait_until(&mut inner, deadline).timed_out() {
                        return if inner.is_drained() {
                            WaitOutcome::Done
                        } else {
                            WaitOutcome::TimedOut
                        };
                    }
                }
                WaitOutcome::Done
            }
        }
    }

    /// Stop the worker: discard pending tasks, wake the worker, and join
    /// it. Idempotent, and a no-op if `start` was never called. The queue
    /// returns to the unstarted state; a later submit starts it again.
    pub fn cancel(&self) {
        let worker = self.worker.lock().take();
        let Some(worker) = worker else {
            return;
        };
        {
            let mut inner = worker.shared.inner.lock();
            inner.cancel = true;
            worker.shared.work.notify_one();
        }
        if worker.handle.join().is_err() {
            tracing::error!("task queue worker panicked during shutdown");
        }
    }

    fn shared(&self) -> Option<Arc<QueueShared>> {
        self.worker.lock().as_ref().map(|w| w.shared.clone())
    }
}

impl Drop for TaskQueue {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn worker_loop(shared: Arc<QueueShared>, ready_tx: crossbeam_channel::Sender<()>) {
    tracing::debug!("task queue worker started");
    let mut inner = shared.inner.lock();
    let _ = ready_tx.send(());
    loop {
        if inner.cancel {
            let discarded = inner.pending.len();
            inner.pending.clear();
            if discarded > 0 {
                tracing::debug!(discarded, "discarded pending tasks on cancel");
            }
            shared.idle.notify_all();
            break;
        }
        // Re-check under the lock rather than polling: a task submitted
        // while the previous one ran is picked up by this same pass.
        if let Some(task) = inner.pending.pop_front() {
            inner.busy = true;
            drop(inner);
            // One bad task must not take the worker down with it.
            if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                tracing::error!("queued task panicked; worker continues");
            }
            inner = shared.inner.lock();
            inner.busy = false;
            if inner.pending.is_empty() {
                shared.idle.notify_all();
            }
        } else {
            shared.idle.notify_all();
            shared.work.wait(&mut inner);
        }
    }
    tracing::debug!("task queue worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_on_unstarted_queue_is_done() {
        let queue = TaskQueue::new();
        assert_eq!(
            queue.wait_until_empty(Some(Duration::from_millis(10))),
            WaitOutcome::Done
        );
    }

    #[test]
    fn cancel_without_start_is_a_noop() {
        let queue = TaskQueue::new();
        queue.cancel();
        queue.cancel();
    }

    #[test]
    fn start_is_idempotent() {
        let queue = TaskQueue::new();
        queue.start().unwrap();
        queue.start().unwrap();
        queue.cancel();
    }
}
