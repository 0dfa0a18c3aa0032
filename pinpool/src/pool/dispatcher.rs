//! # Dispatcher
//!
//! Public face of the pool. Creates one external resource and one worker thread
//! per index, accepts task submissions targeted at a subset of workers, collects
//! exactly one report per targeted worker, and tears the pool down.
//!
//! ## Key Concepts
//! - Construction is all-or-nothing: if any resource cannot be created or bound,
//!   everything created so far is released and construction fails
//! - Submission blocks at the pause gate while the pool is paused
//! - Each submit call gets its own result channel, so concurrent calls never
//!   consume each other's results
//! - Teardown joins every worker before releasing its resource
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pinpool::{ClosureFactory, Dispatcher, PoolConfig, Threads};
//!
//! # fn main() -> Result<(), pinpool::PoolError> {
//! let factory = ClosureFactory::new(|index| Ok(format!("engine-{}", index)));
//! let pool = Dispatcher::new(PoolConfig::with_workers(4), factory)?;
//!
//! // Runs on workers 0, 1 and 3 and waits for all three reports
//! let reports = pool.submit_blocking(Threads::Spec("0-1,3"), |ctx, engine: &mut String| {
//!     Ok(format!("{} ran call {}", engine, ctx.call_id))
//! })?;
//! assert_eq!(reports.len(), 3);
//!
//! pool.reset()?;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

use pinpool_api::control::PoolControl;
use pinpool_api::notify::{Notification, NotificationSink};
use pinpool_api::resource::ResourceFactory;

use crate::pool::config::PoolConfig;
use crate::pool::error::PoolError;
use crate::pool::gate::PauseGate;
use crate::pool::handle::TransitHandle;
use crate::pool::stream::ResultStream;
use crate::pool::task::{BoxedTask, Task, TaskContext, TaskReport};
use crate::pool::thread_set::{ThreadSet, Threads};
use crate::pool::worker::{lock, Worker, WorkerState};

/// Fixed pool of workers, each exclusively owning one resource from `F`.
pub struct Dispatcher<F: ResourceFactory> {
    config: PoolConfig,
    factory: Arc<F>,
    workers: Vec<Worker<F>>,
    gate: PauseGate,
    sink: Option<Arc<dyn NotificationSink>>,
    /// Serializes enqueueing against workers draining their queues on dismissal
    coordination: Arc<Mutex<()>>,
    running: AtomicBool,
}

impl<F: ResourceFactory> fmt::Debug for Dispatcher<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("worker_count", &self.workers.len())
            .field("running", &self.is_running())
            .field("gate", &self.gate)
            .field("workers", &self.workers)
            .finish()
    }
}

impl<F: ResourceFactory> Dispatcher<F> {
    /// Create the resources and start one worker per resource.
    pub fn new(config: PoolConfig, factory: F) -> Result<Self, PoolError> {
        Self::build(config, factory, None)
    }

    /// Like [`new`](Self::new), reporting task results and pause state to `sink`.
    pub fn with_sink(
        config: PoolConfig,
        factory: F,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self, PoolError> {
        Self::build(config, factory, Some(sink))
    }

    fn build(
        config: PoolConfig,
        factory: F,
        sink: Option<Arc<dyn NotificationSink>>,
    ) -> Result<Self, PoolError> {
        config.validate()?;
        let span = crate::dispatch_span!("create_pool", workers = config.worker_count);
        let _enter = span.enter();

        let factory = Arc::new(factory);
        let count = config.worker_count;

        // Create every resource up front, in this context
        let mut transits = Vec::with_capacity(count);
        for index in 0..count {
            match TransitHandle::create(&*factory, index) {
                Ok(transit) => transits.push(transit),
                Err(e) => {
                    crate::log_error!(e, worker = index);
                    for transit in transits {
                        transit.release(&*factory);
                    }
                    return Err(e);
                }
            }
        }

        let coordination = Arc::new(Mutex::new(()));
        let mut workers = Vec::with_capacity(count);
        let mut readiness = Vec::with_capacity(count);
        let mut transits = transits.into_iter().enumerate();

        while let Some((index, transit)) = transits.next() {
            let thread_name = format!("{}{}", config.thread_name_prefix, index);
            match Worker::spawn(
                index,
                transit,
                Arc::clone(&factory),
                Arc::clone(&coordination),
                config.poll_interval,
                thread_name,
            ) {
                Ok((worker, ready)) => {
                    workers.push(worker);
                    readiness.push(ready);
                }
                Err((e, transit)) => {
                    crate::log_error!(e);
                    transit.release(&*factory);
                    for (_, transit) in transits {
                        transit.release(&*factory);
                    }
                    abort_workers(&workers, &factory);
                    return Err(e);
                }
            }
        }

        // Every worker reports once its resource is bound
        let mut first_error = None;
        for (worker, ready) in workers.iter().zip(readiness) {
            let outcome = ready.recv().unwrap_or_else(|_| {
                Err(PoolError::ThreadSetup(format!(
                    "Worker thread {} exited during start-up",
                    worker.index()
                )))
            });
            if let Err(e) = outcome {
                first_error.get_or_insert(e);
            }
        }
        if let Some(e) = first_error {
            crate::log_error!(e);
            abort_workers(&workers, &factory);
            return Err(e);
        }

        crate::log_dispatch!("pool", "created", workers = count);
        Ok(Self {
            gate: PauseGate::new(config.start_paused),
            config,
            factory,
            workers,
            sink,
            coordination,
            running: AtomicBool::new(true),
        })
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// True once the pause gate is closed by teardown. Pausing goes through
    /// [`PoolControl`] so observers are told.
    pub fn is_closed(&self) -> bool {
        self.gate.is_closed()
    }

    pub fn worker_states(&self) -> Vec<WorkerState> {
        self.workers.iter().map(Worker::state).collect()
    }

    /// Thread-set string naming every worker, e.g. `"0-3"`.
    pub fn all_threads(&self) -> String {
        ThreadSet::canonical_all(self.workers.len())
    }

    /// Run `body` on every worker selected by `threads` and wait for all reports.
    ///
    /// Enqueueing briefly takes a std mutex shared with workers draining their
    /// queues on dismissal, so it can block the executor thread for the length
    /// of one drain. It is never held across an `.await` or while a resource unbinds.
    pub async fn submit<T, B>(&self, threads: Threads<'_>, body: B) -> Result<Vec<TaskReport<T>>, PoolError>
    where
        T: Send + 'static,
        B: Fn(&TaskContext, &mut F::Resource) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let stream = self.submit_stream(threads, body).await?;
        Ok(stream.collect_all().await)
    }

    /// Like [`submit`](Self::submit), sharing one typed argument bundle with every task.
    pub async fn submit_with<T, A, B>(
        &self,
        threads: Threads<'_>,
        args: A,
        body: B,
    ) -> Result<Vec<TaskReport<T>>, PoolError>
    where
        T: Send + 'static,
        A: Send + Sync + 'static,
        B: Fn(&TaskContext, &mut F::Resource, &A) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let args = Arc::new(args);
        self.submit(threads, move |ctx: &TaskContext, resource: &mut F::Resource| {
            body(ctx, resource, &args)
        })
        .await
    }

    /// Blocking [`submit`](Self::submit) for callers outside an async context.
    pub fn submit_blocking<T, B>(&self, threads: Threads<'_>, body: B) -> Result<Vec<TaskReport<T>>, PoolError>
    where
        T: Send + 'static,
        B: Fn(&TaskContext, &mut F::Resource) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let stream = futures::executor::block_on(self.dispatch(threads, body))?;
        Ok(stream.collect_blocking())
    }

    /// Enqueue `body` on the selected workers and stream their reports as they arrive.
    ///
    /// Enqueueing takes the same short std mutex as [`submit`](Self::submit).
    pub async fn submit_stream<T, B>(&self, threads: Threads<'_>, body: B) -> Result<ResultStream<T>, PoolError>
    where
        T: Send + 'static,
        B: Fn(&TaskContext, &mut F::Resource) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        // Let the caller's event loop service inbound commands before blocking
        match self.config.submit_yield {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }
        self.dispatch(threads, body).await
    }

    async fn dispatch<T, B>(&self, threads: Threads<'_>, body: B) -> Result<ResultStream<T>, PoolError>
    where
        T: Send + 'static,
        B: Fn(&TaskContext, &mut F::Resource) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        if !self.is_running() {
            return Err(PoolError::NotRunning);
        }
        let targets = threads.resolve(self.workers.len())?;

        // Blocks here while paused
        let permit = self.gate.admit().await?;

        let call_id = Uuid::new_v4();
        let (reply, receiver) = flume::unbounded();
        let body = Arc::new(body);
        {
            let _guard = lock(&self.coordination);
            if !self.is_running() {
                return Err(PoolError::NotRunning);
            }
            if let Some(worker) = targets.iter().map(|&i| &self.workers[i]).find(|w| w.is_dismissed()) {
                return Err(PoolError::WorkerDismissed(worker.index()));
            }

            for &index in &targets {
                let context = TaskContext { call_id, worker: index };
                let task: BoxedTask<F::Resource> =
                    Box::new(Task::new(context, Arc::clone(&body), reply.clone()));
                self.workers[index].enqueue(task)?;
            }
        }
        drop(permit);

        crate::log_dispatch!("pool", "submitted", call_id = %call_id, threads = %targets);
        let pending: BTreeSet<usize> = targets.into_iter().collect();
        Ok(ResultStream::new(call_id, receiver, pending, self.sink.clone()))
    }

    /// Dismiss the selected workers, join them and release their resources.
    ///
    /// Tasks still queued on those workers are discarded. Should only be called
    /// once no caller is waiting on them. Blocks until every selected resource
    /// is unbound and released; from async code run it under `spawn_blocking`.
    pub fn dismiss(&self, threads: Threads<'_>) -> Result<(), PoolError> {
        let targets = threads.resolve(self.workers.len())?;
        let span = crate::dispatch_span!("dismiss", threads = %targets);
        let _enter = span.enter();

        for &index in &targets {
            self.workers[index].dismiss();
        }

        let mut errors = Vec::new();
        for &index in &targets {
            if let Err(e) = release_worker(&self.workers[index], &self.factory) {
                errors.push(e.to_string());
            }
        }

        if self.workers.iter().all(Worker::is_dismissed) {
            self.stop();
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(PoolError::ShutdownError(errors.join("\n")))
        }
    }

    /// Tear the whole pool down. Safe to call more than once.
    pub fn reset(&self) -> Result<(), PoolError> {
        let result = self.dismiss(Threads::All);
        self.stop();
        result
    }

    fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            self.gate.close();
            crate::log_dispatch!("pool", "stopped");
        }
    }

    fn notify_paused(&self, paused: bool) {
        if let Some(sink) = &self.sink {
            let mut state = Map::new();
            state.insert("paused".to_string(), Value::Bool(paused));
            sink.notify(Notification::state_map(200, state));
        }
    }
}

#[async_trait]
impl<F: ResourceFactory> PoolControl for Dispatcher<F> {
    async fn pause(&self) -> bool {
        let changed = self.gate.pause().await;
        if changed {
            tracing::info!("Pause pool");
            self.notify_paused(true);
        }
        changed
    }

    async fn resume(&self) -> bool {
        let changed = self.gate.resume().await;
        if changed {
            tracing::info!("Resume pool");
            self.notify_paused(false);
        }
        changed
    }

    fn is_paused(&self) -> bool {
        self.gate.is_paused()
    }
}

impl<F: ResourceFactory> Drop for Dispatcher<F> {
    fn drop(&mut self) {
        if self.is_running() {
            if let Err(e) = self.reset() {
                crate::log_error!(e, operation = "drop");
            }
        }
    }
}

/// Join one worker and release the resource it hands back.
fn release_worker<F: ResourceFactory>(worker: &Worker<F>, factory: &Arc<F>) -> Result<(), PoolError> {
    match worker.join()? {
        Some(transit) => {
            transit.release(&**factory);
            Ok(())
        }
        None => Ok(()),
    }
}

/// Stop workers of a pool whose construction failed.
fn abort_workers<F: ResourceFactory>(workers: &[Worker<F>], factory: &Arc<F>) {
    for worker in workers {
        worker.dismiss();
    }
    for worker in workers {
        if let Err(e) = release_worker(worker, factory) {
            crate::log_error!(e, worker = worker.index());
        }
    }
}
