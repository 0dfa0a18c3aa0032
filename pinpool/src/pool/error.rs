use thiserror::Error;

use pinpool_api::errors::ResourceError;

/// Errors raised while parsing a thread-set string such as `"0-2,5"`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ThreadSpecError {
    #[error("Thread spec is empty")]
    Empty,
    #[error("Thread spec '{0}' contains an empty entry")]
    EmptyToken(String),
    #[error("Malformed thread spec entry: '{0}'")]
    Malformed(String),
    #[error("Reversed thread range: {low}-{high}")]
    Reversed { low: usize, high: usize },
    #[error("Thread index {index} is out of range for a pool of {size} workers")]
    OutOfRange { index: usize, size: usize },
}

/// Errors related to the worker pool itself.
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Invalid thread spec: {0}")]
    InvalidThreadSpec(#[from] ThreadSpecError),
    #[error("Worker pool is not running")]
    NotRunning,
    #[error("Worker {0} has been dismissed")]
    WorkerDismissed(usize),
    #[error("Failed to create resource for worker {index}: {source}")]
    ResourceCreation {
        index: usize,
        #[source]
        source: ResourceError,
    },
    #[error("Resource transfer protocol violated: {0}")]
    TransferProtocol(String),
    #[error("Thread setup error: {0}")]
    ThreadSetup(String),
    #[error("Failed during shutdown: {0}")]
    ShutdownError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Why a task did not produce a value. Carried inside its report; never
/// propagated out of the worker.
#[derive(Error, Debug)]
pub enum TaskFailure {
    #[error("Task returned an error: {0:#}")]
    Returned(anyhow::Error),
    #[error("Task panicked: {0}")]
    Panicked(String),
    #[error("Task was discarded before it ran")]
    Discarded,
}
