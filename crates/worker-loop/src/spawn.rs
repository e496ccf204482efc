use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::debug;

use driftbrowser_core_types::WorkerId;

use crate::run_loop::WorkerRunLoop;

/// Owning handle for a dedicated worker thread driving a [`WorkerRunLoop`].
pub struct WorkerThread {
    id: WorkerId,
    run_loop: Arc<WorkerRunLoop>,
    handle: Option<JoinHandle<()>>,
}

impl WorkerThread {
    /// Spawns a named thread that drains the loop until termination.
    pub fn spawn(name: impl Into<String>) -> io::Result<Self> {
        let id = WorkerId::new();
        let run_loop = Arc::new(WorkerRunLoop::new());
        let thread_loop = Arc::clone(&run_loop);
        let thread_id = id.clone();
        let handle = thread::Builder::new().name(name.into()).spawn(move || {
            debug!(worker = %thread_id, "worker thread started");
            thread_loop.run();
            debug!(worker = %thread_id, "worker thread stopped");
        })?;
        Ok(Self {
            id,
            run_loop,
            handle: Some(handle),
        })
    }

    pub fn id(&self) -> &WorkerId {
        &self.id
    }

    pub fn run_loop(&self) -> Arc<WorkerRunLoop> {
        Arc::clone(&self.run_loop)
    }

    /// Tears down the loop's queue; parked restricted-mode runs observe
    /// termination, pending tasks are dropped.
    pub fn terminate(&self) {
        self.run_loop.terminate();
    }

    /// Terminates the loop and waits for the thread to exit.
    pub fn join(mut self) {
        self.run_loop.terminate();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for WorkerThread {
    fn drop(&mut self) {
        self.run_loop.terminate();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
