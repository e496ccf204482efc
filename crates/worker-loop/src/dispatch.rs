use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

use tracing::warn;

use driftbrowser_core_types::DriftError;

/// A job runnable on another thread.
pub type DispatchJob = Box<dyn FnOnce() + Send>;

/// Capability to run jobs on the process's privileged main thread.
pub trait TaskDispatcher: Send + Sync {
    fn dispatch(&self, job: DispatchJob) -> Result<(), DriftError>;
}

enum Command {
    Run(DispatchJob),
    Shutdown,
}

/// Cloneable dispatcher handle onto the main dispatch thread.
#[derive(Clone)]
pub struct MainThreadHandle {
    tx: Sender<Command>,
}

impl TaskDispatcher for MainThreadHandle {
    fn dispatch(&self, job: DispatchJob) -> Result<(), DriftError> {
        self.tx.send(Command::Run(job)).map_err(|_| {
            warn!("main-thread dispatch dropped: loop is gone");
            DriftError::new("main thread dispatcher is gone")
        })
    }
}

/// Owns the main dispatch thread; dropping it shuts the loop down after the
/// commands already queued have run.
pub struct MainThread {
    handle: MainThreadHandle,
    join: Option<JoinHandle<()>>,
}

impl MainThread {
    pub fn spawn() -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel();
        let join = thread::Builder::new()
            .name("main-dispatch".into())
            .spawn(move || {
                while let Ok(cmd) = rx.recv() {
                    match cmd {
                        Command::Run(job) => job(),
                        Command::Shutdown => break,
                    }
                }
            })?;
        Ok(Self {
            handle: MainThreadHandle { tx },
            join: Some(join),
        })
    }

    pub fn handle(&self) -> MainThreadHandle {
        self.handle.clone()
    }
}

impl Drop for MainThread {
    fn drop(&mut self) {
        let _ = self.handle.tx.send(Command::Shutdown);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn dispatch_runs_job_on_loop_thread() {
        let main = MainThread::spawn().unwrap();
        let (tx, rx) = mpsc::channel();
        main.handle()
            .dispatch(Box::new(move || {
                let name = thread::current().name().map(str::to_owned);
                let _ = tx.send(name);
            }))
            .unwrap();

        let name = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(name.as_deref(), Some("main-dispatch"));
    }

    #[test]
    fn dispatch_after_shutdown_errors() {
        let main = MainThread::spawn().unwrap();
        let handle = main.handle();
        drop(main);
        assert!(handle.dispatch(Box::new(|| {})).is_err());
    }
}
