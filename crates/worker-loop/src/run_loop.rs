use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

use crate::queue::{QueueTerminated, TaskQueue};
use crate::task::{TaskMode, WorkerTask};

/// Why a restricted-mode run returned.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RunOutcome {
    /// A task tagged with the awaited channel was delivered and ran.
    TaskRun,
    /// The loop's queue was torn down before any matching task arrived.
    Terminated,
}

/// Cooperative task loop for a single worker thread.
///
/// `run` drains every queued task until termination. `run_restricted`
/// services only tasks tagged with one wait-channel id, leaving all other
/// queued work deferred, so a task can park its thread mid-execution without
/// reentering unrelated work.
pub struct WorkerRunLoop {
    queue: TaskQueue,
    channel_seq: AtomicU64,
}

impl WorkerRunLoop {
    pub fn new() -> Self {
        Self {
            queue: TaskQueue::new(),
            channel_seq: AtomicU64::new(0),
        }
    }

    pub fn post_task(&self, run: impl FnOnce() + Send + 'static) -> Result<(), QueueTerminated> {
        self.queue.post(WorkerTask::new(run))
    }

    pub fn post_task_for_channel(
        &self,
        channel: &str,
        run: impl FnOnce() + Send + 'static,
    ) -> Result<(), QueueTerminated> {
        self.queue.post(WorkerTask::for_channel(channel, run))
    }

    /// Fresh wait-channel id for one restricted-mode exchange: `base` plus a
    /// counter value never handed out before on this loop.
    pub fn next_channel_id(&self, base: &str) -> String {
        let seq = self.channel_seq.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{base}{seq}")
    }

    /// Drains and executes queued tasks of every mode until termination.
    /// The driving thread's main loop.
    pub fn run(&self) {
        loop {
            match self.queue.wait_matching(|_| true) {
                Ok(task) => task.run(),
                Err(QueueTerminated) => {
                    trace!("worker run loop terminated");
                    return;
                }
            }
        }
    }

    /// Parks the calling thread until a task tagged with exactly `channel`
    /// arrives (running it) or the queue is torn down. Other queued work is
    /// deferred, not dropped.
    ///
    /// Intended to be called from within a task executing in `run` on the
    /// thread driving this loop; a concurrent unfiltered wait on another
    /// thread would race it for the tagged task.
    pub fn run_restricted(&self, channel: &str) -> RunOutcome {
        let matched = self
            .queue
            .wait_matching(|task| matches!(task.mode(), TaskMode::Channel(tag) if tag == channel));
        match matched {
            Ok(task) => {
                task.run();
                RunOutcome::TaskRun
            }
            Err(QueueTerminated) => RunOutcome::Terminated,
        }
    }

    /// Number of tasks still queued.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn terminate(&self) {
        self.queue.kill();
    }

    pub fn is_terminated(&self) -> bool {
        self.queue.is_killed()
    }
}

impl Default for WorkerRunLoop {
    fn default() -> Self {
        Self::new()
    }
}
