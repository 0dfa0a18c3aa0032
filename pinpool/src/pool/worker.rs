//! # Worker Thread Module
//!
//! Each worker is a dedicated OS thread that owns exactly one bound resource
//! handle for its whole running lifetime.
//!
//! ## Lifecycle
//! - `Starting`: the transit handle is received and bound inside the thread
//! - `Running`: tasks are pulled from the private queue and run one at a time
//! - `Dismissing`: queued tasks are discarded and the handle is unbound
//! - `Terminated`: the thread returns the transit handle to whoever joins it
//!
//! Joining is the only proof that a worker has unbound its resource, so the
//! transit handle is handed back as the thread's join value and released by
//! the joiner.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use flume::{Receiver, RecvTimeoutError, Sender};

use pinpool_api::resource::ResourceFactory;

use crate::logging;
use crate::pool::error::PoolError;
use crate::pool::handle::TransitHandle;
use crate::pool::task::{panic_message, BoxedTask, Envelope};

/// States a worker can be in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Thread spawned, resource not bound yet
    Starting,
    /// Resource bound, accepting tasks
    Running,
    /// Dismissal observed, releasing the resource
    Dismissing,
    /// Resource unbound, thread finished or finishing
    Terminated,
}

type WorkerResult<F> = Option<TransitHandle<<F as ResourceFactory>::Transit>>;

/// Owner-side handle of one worker thread.
pub struct Worker<F: ResourceFactory> {
    index: usize,

    /// Private task queue
    sender: Sender<Envelope<F::Resource>>,

    dismissed: Arc<AtomicBool>,

    state: Arc<Mutex<WorkerState>>,

    /// Taken exactly once, by whoever joins the thread
    thread_handle: Mutex<Option<JoinHandle<WorkerResult<F>>>>,
}

impl<F: ResourceFactory> fmt::Debug for Worker<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("index", &self.index)
            .field("state", &self.state())
            .field("dismissed", &self.is_dismissed())
            .field("has_thread", &lock(&self.thread_handle).is_some())
            .finish()
    }
}

/// Everything the worker thread needs, moved into it at spawn.
struct WorkerContext<F: ResourceFactory> {
    index: usize,
    factory: Arc<F>,
    handoff: Receiver<TransitHandle<F::Transit>>,
    ready: Sender<Result<(), PoolError>>,
    tasks: Receiver<Envelope<F::Resource>>,
    dismissed: Arc<AtomicBool>,
    state: Arc<Mutex<WorkerState>>,
    coordination: Arc<Mutex<()>>,
    poll_interval: Duration,
}

impl<F: ResourceFactory> Worker<F> {
    /// Spawn worker `index` and hand it `transit` to bind.
    ///
    /// The returned receiver yields once the resource is bound (or binding
    /// failed). If the thread cannot be spawned the transit handle is given
    /// back so the caller can release it.
    pub(crate) fn spawn(
        index: usize,
        transit: TransitHandle<F::Transit>,
        factory: Arc<F>,
        coordination: Arc<Mutex<()>>,
        poll_interval: Duration,
        thread_name: String,
    ) -> Result<(Self, Receiver<Result<(), PoolError>>), (PoolError, TransitHandle<F::Transit>)> {
        let (sender, tasks) = flume::unbounded();
        let (handoff_tx, handoff) = flume::bounded(1);
        let (ready, ready_rx) = flume::bounded(1);
        let dismissed = Arc::new(AtomicBool::new(false));
        let state = Arc::new(Mutex::new(WorkerState::Starting));

        let context = WorkerContext {
            index,
            factory,
            handoff,
            ready,
            tasks,
            dismissed: Arc::clone(&dismissed),
            state: Arc::clone(&state),
            coordination,
            poll_interval,
        };

        let dispatch = logging::current_subscriber();
        let spawned = thread::Builder::new()
            .name(thread_name)
            .spawn(move || {
                let _subscriber = tracing::dispatcher::set_default(&dispatch);
                Self::worker_thread_main(context)
            });

        let thread_handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                return Err((
                    PoolError::ThreadSetup(format!("Failed to spawn worker thread {}: {}", index, e)),
                    transit,
                ))
            }
        };

        // Capacity 1 and a live receiver: the thread is running and waiting for it.
        if let Err(flume::SendError(transit)) = handoff_tx.send(transit) {
            let _ = thread_handle.join();
            return Err((
                PoolError::ThreadSetup(format!("Worker thread {} exited before handoff", index)),
                transit,
            ));
        }

        let worker = Self {
            index,
            sender,
            dismissed,
            state,
            thread_handle: Mutex::new(Some(thread_handle)),
        };
        Ok((worker, ready_rx))
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> WorkerState {
        *lock(&self.state)
    }

    pub fn is_dismissed(&self) -> bool {
        self.dismissed.load(Ordering::SeqCst)
    }

    /// Queue a task. Callers hold the coordination lock.
    pub(crate) fn enqueue(&self, task: BoxedTask<F::Resource>) -> Result<(), PoolError> {
        self.sender
            .send(Envelope::Run(task))
            .map_err(|_| PoolError::WorkerDismissed(self.index))
    }

    /// Ask the thread to stop after its current task.
    pub(crate) fn dismiss(&self) {
        if !self.dismissed.swap(true, Ordering::SeqCst) {
            crate::log_lifecycle!(self.index, "dismissed");
        }
        // Wakes an idle worker instead of waiting out its poll interval
        let _ = self.sender.send(Envelope::Wake);
    }

    /// Wait for the thread to finish and take back its transit handle.
    ///
    /// Returns `Ok(None)` if the thread was already joined.
    pub(crate) fn join(&self) -> Result<WorkerResult<F>, PoolError> {
        let handle = lock(&self.thread_handle).take();
        let Some(handle) = handle else {
            return Ok(None);
        };
        let result = handle.join();
        *lock(&self.state) = WorkerState::Terminated;
        result.map_err(|e| {
            PoolError::ShutdownError(format!(
                "Worker thread {} panicked: {}",
                self.index,
                panic_message(e.as_ref())
            ))
        })
    }

    /// Main function for the worker thread
    fn worker_thread_main(context: WorkerContext<F>) -> WorkerResult<F> {
        let index = context.index;
        let span = crate::worker_span!(index);
        let _enter = span.enter();

        let transit = match context.handoff.recv() {
            Ok(transit) => transit,
            Err(_) => return None,
        };

        if transit.index() != index {
            let _ = context.ready.send(Err(PoolError::TransferProtocol(format!(
                "resource {} delivered to worker {}",
                transit.index(),
                index
            ))));
            return Some(transit);
        }

        let mut handle = match transit.bind(&*context.factory) {
            Ok(handle) => handle,
            Err(e) => {
                crate::log_error!(e, worker = index);
                let _ = context.ready.send(Err(e));
                return None;
            }
        };

        *lock(&context.state) = WorkerState::Running;
        let _ = context.ready.send(Ok(()));
        crate::log_lifecycle!(index, "running");

        let result = panic::catch_unwind(AssertUnwindSafe(|| loop {
            if context.dismissed.load(Ordering::SeqCst) {
                break;
            }

            // The timeout only exists so dismissal is observed while idle
            match context.tasks.recv_timeout(context.poll_interval) {
                Ok(Envelope::Run(task)) => {
                    crate::log_dispatch!(index, "task_started", call_id = %task.context().call_id);
                    task.run(handle.resource_mut());
                }
                Ok(Envelope::Wake) | Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    context.dismissed.store(true, Ordering::SeqCst);
                }
            }
        }));

        if let Err(payload) = result {
            let msg = panic_message(payload.as_ref());
            tracing::error!(worker = index, panic = %msg, "worker loop panicked");
        }
        context.dismissed.store(true, Ordering::SeqCst);

        {
            // Serializes against submissions enqueueing onto this worker
            let _guard = lock(&context.coordination);
            *lock(&context.state) = WorkerState::Dismissing;

            let discarded = context
                .tasks
                .try_iter()
                .filter(|envelope| matches!(envelope, Envelope::Run(_)))
                .count();
            if discarded > 0 {
                tracing::debug!(worker = index, discarded, "discarded queued tasks");
            }
        }

        // Unbinding can be slow; submissions to other workers must not wait on it
        let transit = handle.unbind(&*context.factory);
        *lock(&context.state) = WorkerState::Terminated;
        crate::log_lifecycle!(index, "terminated");
        Some(transit)
    }
}

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::task::{Task, TaskContext};
    use pinpool_api::resource::ClosureFactory;
    use uuid::Uuid;

    fn factory() -> Arc<ClosureFactory<Vec<usize>, impl Fn(usize) -> Result<Vec<usize>, pinpool_api::ResourceError> + Send + Sync>> {
        Arc::new(ClosureFactory::new(|index| Ok(vec![index])))
    }

    #[test]
    fn test_worker_runs_tasks_and_returns_its_transit() {
        let factory = factory();
        let transit = TransitHandle::create(&*factory, 0).unwrap();
        let (worker, ready) = Worker::spawn(
            0,
            transit,
            Arc::clone(&factory),
            Arc::new(Mutex::new(())),
            Duration::from_millis(20),
            "worker-test-0".to_string(),
        )
        .unwrap();
        ready.recv().unwrap().unwrap();
        assert_eq!(worker.state(), WorkerState::Running);

        let (reply, results) = flume::unbounded();
        let context = TaskContext { call_id: Uuid::new_v4(), worker: 0 };
        let body = Arc::new(|_: &TaskContext, resource: &mut Vec<usize>| -> anyhow::Result<usize> {
            resource.push(42);
            Ok(resource.len())
        });
        worker.enqueue(Box::new(Task::new(context, body, reply))).unwrap();
        assert_eq!(results.recv().unwrap().outcome.unwrap(), 2);

        worker.dismiss();
        let transit = worker.join().unwrap().unwrap();
        assert_eq!(transit.transit(), &vec![0, 42]);
        assert_eq!(worker.state(), WorkerState::Terminated);
        assert!(worker.join().unwrap().is_none());
        transit.release(&*factory);
    }

    #[test]
    fn test_index_mismatch_hands_the_transit_back() {
        let factory = factory();
        let transit = TransitHandle::create(&*factory, 1).unwrap();
        let (worker, ready) = Worker::spawn(
            0,
            transit,
            Arc::clone(&factory),
            Arc::new(Mutex::new(())),
            Duration::from_millis(20),
            "worker-test-mismatch".to_string(),
        )
        .unwrap();

        assert!(matches!(ready.recv().unwrap(), Err(PoolError::TransferProtocol(_))));
        let transit = worker.join().unwrap().unwrap();
        assert_eq!(transit.index(), 1);
        transit.release(&*factory);
    }
}
