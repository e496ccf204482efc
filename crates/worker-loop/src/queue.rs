use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};
use thiserror::Error;
use tracing::trace;

use crate::task::WorkerTask;

/// Returned once the queue has been killed; no further work is accepted or
/// delivered.
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
#[error("task queue terminated")]
pub struct QueueTerminated;

#[derive(Default)]
struct QueueState {
    tasks: VecDeque<WorkerTask>,
    killed: bool,
}

/// Multi-producer task queue with a filtered blocking receive.
///
/// A waiter removes only tasks its filter accepts; everything else stays
/// queued in arrival order for a later, less selective wait.
pub struct TaskQueue {
    state: Mutex<QueueState>,
    ready: Condvar,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            ready: Condvar::new(),
        }
    }

    pub fn post(&self, task: WorkerTask) -> Result<(), QueueTerminated> {
        let mut state = self.state.lock();
        if state.killed {
            return Err(QueueTerminated);
        }
        state.tasks.push_back(task);
        self.ready.notify_all();
        Ok(())
    }

    /// Blocks until a task accepted by `filter` is queued, removing and
    /// returning it, or until the queue is killed.
    pub fn wait_matching(
        &self,
        filter: impl Fn(&WorkerTask) -> bool,
    ) -> Result<WorkerTask, QueueTerminated> {
        let mut state = self.state.lock();
        loop {
            if state.killed {
                return Err(QueueTerminated);
            }
            if let Some(idx) = state.tasks.iter().position(|task| filter(task)) {
                return Ok(state.tasks.remove(idx).expect("matched index in range"));
            }
            self.ready.wait(&mut state);
        }
    }

    /// Kills the queue: pending tasks are dropped unexecuted and every parked
    /// waiter observes `QueueTerminated`. Idempotent.
    pub fn kill(&self) {
        {
            let mut state = self.state.lock();
            if state.killed {
                return;
            }
            state.killed = true;
            state.tasks.clear();
        }
        self.ready.notify_all();
        trace!("task queue killed");
    }

    pub fn is_killed(&self) -> bool {
        self.state.lock().killed
    }

    pub fn len(&self) -> usize {
        self.state.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().tasks.is_empty()
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}
