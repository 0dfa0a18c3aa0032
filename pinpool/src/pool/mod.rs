//! Worker pool: resource handles, workers, dispatch and the pause gate.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod gate;
pub mod handle;
pub mod stream;
pub mod task;
pub mod thread_set;
pub mod worker;

// Re-export key types for easier usage
pub use config::{NotifyConfig, PoolConfig};
pub use dispatcher::Dispatcher;
pub use error::{PoolError, TaskFailure, ThreadSpecError};
pub use gate::PauseGate;
pub use handle::{BoundHandle, TransitHandle};
pub use stream::ResultStream;
pub use task::{TaskContext, TaskInfo, TaskReport};
pub use thread_set::{ThreadSet, Threads};
pub use worker::WorkerState;
