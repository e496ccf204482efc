use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use driftbrowser_worker_loop::{TaskDispatcher, WorkerRunLoop};

use crate::PermissionAuthority;

struct BridgeState {
    result: bool,
    // Present until cancellation; clearing it IS the cancellation signal.
    worker_loop: Option<Arc<WorkerRunLoop>>,
}

/// One-shot rendezvous between a worker parked on a wait channel and the
/// main thread computing its answer.
///
/// Shared by both threads behind an `Arc`. A single mutex guards the result
/// slot and the back-reference to the worker loop; a completion that arrives
/// after the back-reference was cleared is computed but never delivered.
pub struct CompletionBridge {
    state: Mutex<BridgeState>,
}

impl CompletionBridge {
    /// Builds the bridge and dispatches the evaluation job to the main
    /// thread, carrying the subject name, the wait-channel id and a
    /// thread-safe reference to the bridge. Construction happens before any
    /// sharing, so no lock is taken until the job can race with the
    /// requester. Returns immediately.
    pub fn submit(
        authority: Weak<dyn PermissionAuthority>,
        main_thread: &dyn TaskDispatcher,
        worker_loop: Arc<WorkerRunLoop>,
        subject: &str,
        channel: &str,
    ) -> Arc<Self> {
        let bridge = Arc::new(Self {
            state: Mutex::new(BridgeState {
                result: false,
                worker_loop: Some(worker_loop),
            }),
        });

        let job_bridge = Arc::clone(&bridge);
        let job_subject = subject.to_string();
        let job_channel = channel.to_string();
        let dispatched = main_thread.dispatch(Box::new(move || {
            // The authority may be gone by the time this runs; that is a
            // denial, not a fault.
            let allowed = match authority.upgrade() {
                Some(authority) => authority.allow_storage(&job_subject),
                None => false,
            };
            job_bridge.signal_completed(allowed, &job_channel);
        }));

        if dispatched.is_err() {
            // No main thread left to answer; deliver the denial directly so
            // the requester does not park for an answer that cannot come.
            bridge.signal_completed(false, channel);
        }

        bridge
    }

    /// Stops any in-flight or future completion from reaching the requester.
    /// The evaluation itself may still run; its result is discarded.
    /// Idempotent.
    pub fn cancel(&self) {
        self.state.lock().worker_loop = None;
    }

    /// The recorded outcome. Only meaningful once the requester has observed
    /// the wake on its wait channel, or after [`cancel`](Self::cancel).
    pub fn result(&self) -> bool {
        self.state.lock().result
    }

    /// Records the outcome and wakes the requester's wait channel, unless
    /// cancellation already cleared the back-reference. The lock is released
    /// before the wake is posted.
    fn signal_completed(&self, allowed: bool, channel: &str) {
        let target = {
            let mut state = self.state.lock();
            let Some(worker_loop) = state.worker_loop.as_ref() else {
                return;
            };
            let target = Arc::clone(worker_loop);
            state.result = allowed;
            target
        };
        // A terminated loop means the requester is observing teardown, not
        // this wake.
        let _ = target.post_task_for_channel(channel, || {});
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use driftbrowser_core_types::DriftError;
    use driftbrowser_worker_loop::DispatchJob;

    struct InlineDispatcher;

    impl TaskDispatcher for InlineDispatcher {
        fn dispatch(&self, job: DispatchJob) -> Result<(), DriftError> {
            job();
            Ok(())
        }
    }

    struct DeferredDispatcher {
        jobs: Mutex<Vec<DispatchJob>>,
    }

    impl DeferredDispatcher {
        fn new() -> Self {
            Self {
                jobs: Mutex::new(Vec::new()),
            }
        }

        fn run_all(&self) {
            let jobs = std::mem::take(&mut *self.jobs.lock());
            for job in jobs {
                job();
            }
        }
    }

    impl TaskDispatcher for DeferredDispatcher {
        fn dispatch(&self, job: DispatchJob) -> Result<(), DriftError> {
            self.jobs.lock().push(job);
            Ok(())
        }
    }

    struct DeadDispatcher;

    impl TaskDispatcher for DeadDispatcher {
        fn dispatch(&self, _job: DispatchJob) -> Result<(), DriftError> {
            Err(DriftError::new("gone"))
        }
    }

    struct Always(bool);

    impl PermissionAuthority for Always {
        fn allow_storage(&self, _subject: &str) -> bool {
            self.0
        }
    }

    #[test]
    fn completion_stores_result_and_posts_wake() {
        let authority: Arc<dyn PermissionAuthority> = Arc::new(Always(true));
        let worker_loop = Arc::new(WorkerRunLoop::new());
        let bridge = CompletionBridge::submit(
            Arc::downgrade(&authority),
            &InlineDispatcher,
            Arc::clone(&worker_loop),
            "inbox",
            "ch-1",
        );

        assert_eq!(worker_loop.pending(), 1);
        assert!(bridge.result());
    }

    #[test]
    fn cancel_before_completion_discards_result_and_wake() {
        let authority: Arc<dyn PermissionAuthority> = Arc::new(Always(true));
        let worker_loop = Arc::new(WorkerRunLoop::new());
        let dispatcher = DeferredDispatcher::new();
        let bridge = CompletionBridge::submit(
            Arc::downgrade(&authority),
            &dispatcher,
            Arc::clone(&worker_loop),
            "inbox",
            "ch-1",
        );

        bridge.cancel();
        bridge.cancel();
        dispatcher.run_all();

        assert_eq!(worker_loop.pending(), 0);
        assert!(!bridge.result());
    }

    #[test]
    fn dropped_authority_denies() {
        let authority: Arc<dyn PermissionAuthority> = Arc::new(Always(true));
        let weak = Arc::downgrade(&authority);
        let worker_loop = Arc::new(WorkerRunLoop::new());
        let dispatcher = DeferredDispatcher::new();
        let bridge =
            CompletionBridge::submit(weak, &dispatcher, Arc::clone(&worker_loop), "inbox", "ch-1");

        drop(authority);
        dispatcher.run_all();

        assert_eq!(worker_loop.pending(), 1);
        assert!(!bridge.result());
    }

    #[test]
    fn dead_dispatcher_delivers_denial() {
        let authority: Arc<dyn PermissionAuthority> = Arc::new(Always(true));
        let worker_loop = Arc::new(WorkerRunLoop::new());
        let bridge = CompletionBridge::submit(
            Arc::downgrade(&authority),
            &DeadDispatcher,
            Arc::clone(&worker_loop),
            "inbox",
            "ch-1",
        );

        assert_eq!(worker_loop.pending(), 1);
        assert!(!bridge.result());
    }
}
