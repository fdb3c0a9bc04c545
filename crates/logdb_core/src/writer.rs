//! Per-file write serialization.
//!
//! Every mutation of a log file goes through a [`WriteCoordinator`]. Each
//! file has a FIFO queue and at most one drain in flight:
//!
//! ```text
//! idle --enqueue--> draining --queue empty--> idle
//!                      |  ^
//!                      +--+ entries arrived during the batch
//! ```
//!
//! The drain runs on the blocking pool, so it starts after the enqueuing
//! call returns and a burst of enqueues coalesces into one batch. A batch
//! is committed as a whole; waiters are answered only once the commit has
//! returned.

use crate::error::{CoreError, CoreResult};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Applies a batch of queued operations to one file.
pub trait BatchCommit: Send + Sync + 'static {
    /// A queued operation.
    type Op: Send + 'static;
    /// Per-operation result handed back to its waiter.
    type Output: Send + 'static;

    /// Applies `batch`, in order, to `file` and makes it durable.
    ///
    /// Returns one output per operation.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch could not be committed. Nothing of the
    /// batch may be visible in that case.
    fn commit(&self, file: &str, batch: Vec<Self::Op>) -> CoreResult<Vec<Self::Output>>;
}

type Reply<T> = oneshot::Sender<CoreResult<T>>;

struct FileQueue<C: BatchCommit> {
    pending: VecDeque<(C::Op, Reply<C::Output>)>,
    running: bool,
}

impl<C: BatchCommit> Default for FileQueue<C> {
    fn default() -> Self {
        Self {
            pending: VecDeque::new(),
            running: false,
        }
    }
}

/// Serializes writes per file name.
///
/// Operations on the same file are committed in enqueue order; different
/// files commit independently and in parallel.
pub struct WriteCoordinator<C: BatchCommit> {
    table: String,
    committer: Arc<C>,
    queues: Mutex<HashMap<String, FileQueue<C>>>,
}

impl<C: BatchCommit> std::fmt::Debug for WriteCoordinator<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteCoordinator")
            .field("table", &self.table)
            .field("files", &self.queues.lock().len())
            .finish()
    }
}

impl<C: BatchCommit> WriteCoordinator<C> {
    /// Creates a coordinator for the files of `table`.
    pub fn new(table: impl Into<String>, committer: Arc<C>) -> Self {
        Self {
            table: table.into(),
            committer,
            queues: Mutex::new(HashMap::new()),
        }
    }

    /// Queues `op` for `file` and returns the receiver of its result.
    ///
    /// Starts a drain if none is running for `file`. Must be called from
    /// within a tokio runtime.
    pub fn enqueue(self: &Arc<Self>, file: &str, op: C::Op) -> oneshot::Receiver<CoreResult<C::Output>> {
        let (tx, rx) = oneshot::channel();
        let start = {
            let mut queues = self.queues.lock();
            let queue = queues.entry(file.to_string()).or_default();
            queue.pending.push_back((op, tx));
            !std::mem::replace(&mut queue.running, true)
        };
        if start {
            let this = Arc::clone(self);
            let file = file.to_string();
            tokio::task::spawn_blocking(move || this.drain(&file));
        }
        rx
    }

    /// Queues `op` for `file` and waits until it has been committed.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CommitFailed`] if the batch holding `op` could
    /// not be committed, or [`CoreError::TaskFailed`] if the drain died.
    pub async fn submit(self: &Arc<Self>, file: &str, op: C::Op) -> CoreResult<C::Output> {
        self.enqueue(file, op).await.map_err(|_| CoreError::TaskFailed {
            message: format!("write to {file} was dropped before it completed"),
        })?
    }

    fn next_batch(&self, file: &str) -> Option<Vec<(C::Op, Reply<C::Output>)>> {
        let mut queues = self.queues.lock();
        let queue = queues.get_mut(file)?;
        if queue.pending.is_empty() {
            queues.remove(file);
            return None;
        }
        Some(queue.pending.drain(..).collect())
    }

    fn drain(&self, file: &str) {
        let _idle = IdleOnPanic { owner: self, file };
        while let Some(batch) = self.next_batch(file) {
            let (ops, replies): (Vec<_>, Vec<_>) = batch.into_iter().unzip();
            let count = ops.len();
            match self.committer.commit(file, ops) {
                Ok(outputs) => {
                    tracing::debug!(table = %self.table, file, entries = count, "batch committed");
                    for (reply, output) in replies.into_iter().zip(outputs) {
                        let _ = reply.send(Ok(output));
                    }
                }
                Err(err) => {
                    tracing::error!(table = %self.table, file, entries = count, error = %err, "batch commit failed");
                    let message = err.to_string();
                    for reply in replies {
                        let _ = reply.send(Err(CoreError::commit_failed(&self.table, file, &message)));
                    }
                }
            }
        }
    }
}

/// Drops the queue of a file whose drain panicked, so later writes start a
/// fresh drain. Waiters of the dropped entries see their sender vanish.
struct IdleOnPanic<'a, C: BatchCommit> {
    owner: &'a WriteCoordinator<C>,
    file: &'a str,
}

impl<C: BatchCommit> Drop for IdleOnPanic<'_, C> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.owner.queues.lock().remove(self.file);
        }
    }
}
