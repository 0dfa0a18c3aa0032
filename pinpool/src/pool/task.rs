use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use uuid::Uuid;

use crate::pool::error::TaskFailure;

/// Passed to every task body alongside the worker's resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskContext {
    /// Identifies the submit call this task belongs to.
    pub call_id: Uuid,
    /// Index of the worker running the task.
    pub worker: usize,
}

/// Metadata of one dispatched task, returned with its outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskInfo {
    pub call_id: Uuid,
    pub worker: usize,
    /// Set when the body returned an error, panicked, or never ran.
    pub failed: bool,
}

/// The result of running one task on one worker.
#[derive(Debug)]
pub struct TaskReport<T> {
    pub task: TaskInfo,
    pub outcome: Result<T, TaskFailure>,
}

impl<T> TaskReport<T> {
    pub(crate) fn new(call_id: Uuid, worker: usize, outcome: Result<T, TaskFailure>) -> Self {
        Self {
            task: TaskInfo {
                call_id,
                worker,
                failed: outcome.is_err(),
            },
            outcome,
        }
    }

    pub fn worker(&self) -> usize {
        self.task.worker
    }

    pub fn is_failed(&self) -> bool {
        self.task.failed
    }

    pub fn value(&self) -> Option<&T> {
        self.outcome.as_ref().ok()
    }

    pub fn failure(&self) -> Option<&TaskFailure> {
        self.outcome.as_ref().err()
    }
}

/// A type-erased task that a worker can run against its resource.
pub(crate) trait Runnable<R>: Send {
    fn context(&self) -> TaskContext;

    /// Run the body and deliver the report. Never unwinds past this call.
    fn run(self: Box<Self>, resource: &mut R);
}

pub(crate) type BoxedTask<R> = Box<dyn Runnable<R>>;

/// Messages delivered to a worker's private queue.
pub(crate) enum Envelope<R> {
    /// Run a task.
    Run(BoxedTask<R>),
    /// No work; makes the worker re-check its dismissal flag right away.
    Wake,
}

impl<R> fmt::Debug for Envelope<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Envelope::Run(task) => f.debug_tuple("Run").field(&task.context()).finish(),
            Envelope::Wake => f.write_str("Wake"),
        }
    }
}

/// A task body bound to one worker together with the call's reply channel.
pub(crate) struct Task<T, B> {
    context: TaskContext,
    body: Arc<B>,
    reply: flume::Sender<TaskReport<T>>,
}

impl<T, B> Task<T, B> {
    pub(crate) fn new(context: TaskContext, body: Arc<B>, reply: flume::Sender<TaskReport<T>>) -> Self {
        Self { context, body, reply }
    }
}

impl<R, T, B> Runnable<R> for Task<T, B>
where
    T: Send + 'static,
    B: Fn(&TaskContext, &mut R) -> anyhow::Result<T> + Send + Sync + 'static,
{
    fn context(&self) -> TaskContext {
        self.context
    }

    fn run(self: Box<Self>, resource: &mut R) {
        let Task { context, body, reply } = *self;

        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| (*body)(&context, resource))) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(TaskFailure::Returned(err)),
            Err(payload) => Err(TaskFailure::Panicked(panic_message(payload.as_ref()))),
        };

        if let Err(failure) = &outcome {
            tracing::warn!(
                worker = context.worker,
                call_id = %context.call_id,
                error = %failure,
                "task failed"
            );
        }

        // The caller may have stopped listening; the report is simply dropped then.
        if reply.send(TaskReport::new(context.call_id, context.worker, outcome)).is_err() {
            tracing::debug!(worker = context.worker, "result receiver dropped");
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Unknown panic".to_string()
    }
}
