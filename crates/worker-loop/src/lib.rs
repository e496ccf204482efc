pub mod dispatch;
pub mod queue;
pub mod run_loop;
pub mod spawn;
pub mod task;

pub use dispatch::{DispatchJob, MainThread, MainThreadHandle, TaskDispatcher};
pub use queue::{QueueTerminated, TaskQueue};
pub use run_loop::{RunOutcome, WorkerRunLoop};
pub use spawn::WorkerThread;
pub use task::{TaskMode, WorkerTask};
