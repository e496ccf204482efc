/// Delivery mode of a queued task.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TaskMode {
    /// Ordinary queued work, delivered by the full run loop.
    Normal,
    /// Work routed to the restricted-mode run parked on this wait channel.
    Channel(String),
}

/// A unit of work queued on a worker run loop.
pub struct WorkerTask {
    run: Box<dyn FnOnce() + Send>,
    mode: TaskMode,
}

impl WorkerTask {
    pub fn new(run: impl FnOnce() + Send + 'static) -> Self {
        Self {
            run: Box::new(run),
            mode: TaskMode::Normal,
        }
    }

    pub fn for_channel(channel: impl Into<String>, run: impl FnOnce() + Send + 'static) -> Self {
        Self {
            run: Box::new(run),
            mode: TaskMode::Channel(channel.into()),
        }
    }

    pub fn mode(&self) -> &TaskMode {
        &self.mode
    }

    pub fn run(self) {
        (self.run)()
    }
}
