// Bounded work channel between the fetcher and the worker pool
//
// A FIFO queue of locked tasks paired with a counting permit. The permit is
// consumed on write and returned on release, so at any time
// permits-in-use + permits-available == maximum_tasks, and the fetcher can
// read the free-permit count to size its next request. The channel enforces
// flow control only; it knows nothing about task semantics.
//
// Write enqueues before acquiring its permit (matching the admission order
// the rest of the accounting was built around); both the queue and the
// semaphore are bounded at maximum_tasks, so the transient window where the
// queue runs ahead of the permit count stays within the bound.

use std::sync::atomic::{AtomicUsize, Ordering};

use taskrig_core::protocol::LockedExternalTask;
use taskrig_core::{Result, TaskError};
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Permit-gated FIFO of locked tasks
pub struct WorkChannel {
    tx: mpsc::Sender<LockedExternalTask>,
    rx: Mutex<mpsc::Receiver<LockedExternalTask>>,
    permits: Semaphore,
    /// Tasks dequeued but not yet released; guards against double release.
    outstanding: AtomicUsize,
}

impl WorkChannel {
    pub fn new(maximum_tasks: usize) -> Self {
        let (tx, rx) = mpsc::channel(maximum_tasks);
        Self {
            tx,
            rx: Mutex::new(rx),
            permits: Semaphore::new(maximum_tasks),
            outstanding: AtomicUsize::new(0),
        }
    }

    /// Unused permits, i.e. how many more tasks this worker may hold
    pub fn capacity(&self) -> usize {
        self.permits.available_permits()
    }

    /// Enqueue a task and consume one permit. Blocks while the channel is
    /// full; fails with `Cancelled` when the token fires first.
    pub async fn write(
        &self,
        task: LockedExternalTask,
        cancellation: &CancellationToken,
    ) -> Result<()> {
        tokio::select! {
            _ = cancellation.cancelled() => return Err(TaskError::Cancelled),
            sent = self.tx.send(task) => sent.map_err(|_| TaskError::Cancelled)?,
        }

        tokio::select! {
            _ = cancellation.cancelled() => Err(TaskError::Cancelled),
            permit = self.permits.acquire() => {
                permit.map_err(|_| TaskError::Cancelled)?.forget();
                Ok(())
            }
        }
    }

    /// Dequeue one task. Blocks until a task exists; fails with `Cancelled`
    /// when the token fires first. Every successful read must be paired
    /// with exactly one `release`.
    pub async fn read(&self, cancellation: &CancellationToken) -> Result<LockedExternalTask> {
        let task = tokio::select! {
            _ = cancellation.cancelled() => return Err(TaskError::Cancelled),
            task = async {
                let mut rx = self.rx.lock().await;
                rx.recv().await
            } => task.ok_or(TaskError::Cancelled)?,
        };

        self.outstanding.fetch_add(1, Ordering::SeqCst);
        Ok(task)
    }

    /// Return exactly one permit for a previously dequeued task. A release
    /// without a matching read would silently over-admit capacity, so it is
    /// refused and logged instead.
    pub fn release(&self) -> bool {
        let claimed = self
            .outstanding
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |outstanding| {
                outstanding.checked_sub(1)
            });

        match claimed {
            Ok(_) => {
                self.permits.add_permits(1);
                true
            }
            Err(_) => {
                warn!("work channel release without a matching read; ignoring");
                false
            }
        }
    }
}
