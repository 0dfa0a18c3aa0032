// Shared test fixtures: a factory for a thread-affine mock engine that counts
// every lifecycle call.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::Duration;

use pinpool::{Dispatcher, PoolConfig, ResourceError, ResourceFactory};

/// Live engine handle. Holds an `Rc`, so it cannot leave its thread.
pub struct Engine {
    pub index: usize,
    pub bound_on: ThreadId,
    history: Rc<RefCell<Vec<String>>>,
}

impl Engine {
    /// Run a command against the engine and remember it.
    pub fn run(&mut self, command: &str) -> String {
        self.history.borrow_mut().push(command.to_string());
        format!("engine-{}:{}", self.index, command)
    }

    pub fn history_len(&self) -> usize {
        self.history.borrow().len()
    }
}

/// Transfer form of an engine.
#[derive(Debug)]
pub struct EngineTransit {
    pub index: usize,
    history: Vec<String>,
}

#[derive(Debug, Default)]
pub struct Counters {
    pub created: AtomicUsize,
    pub bound: AtomicUsize,
    pub unbound: AtomicUsize,
    pub released: AtomicUsize,
    pub released_indices: Mutex<Vec<usize>>,
}

impl Counters {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn bound(&self) -> usize {
        self.bound.load(Ordering::SeqCst)
    }

    pub fn unbound(&self) -> usize {
        self.unbound.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn released_indices(&self) -> Vec<usize> {
        let mut indices = self.released_indices.lock().unwrap().clone();
        indices.sort_unstable();
        indices
    }
}

#[derive(Debug, Default)]
pub struct EngineFactory {
    pub counters: Arc<Counters>,
    pub fail_create_at: Option<usize>,
    pub fail_bind_at: Option<usize>,
    pub unbind_delay: Option<Duration>,
}

impl EngineFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_create(index: usize) -> Self {
        Self {
            fail_create_at: Some(index),
            ..Default::default()
        }
    }

    pub fn failing_bind(index: usize) -> Self {
        Self {
            fail_bind_at: Some(index),
            ..Default::default()
        }
    }

    /// Engines that take `delay` to shut down on their worker thread.
    pub fn slow_unbind(delay: Duration) -> Self {
        Self {
            unbind_delay: Some(delay),
            ..Default::default()
        }
    }
}

impl ResourceFactory for EngineFactory {
    type Resource = Engine;
    type Transit = EngineTransit;

    fn create(&self, index: usize) -> Result<EngineTransit, ResourceError> {
        if self.fail_create_at == Some(index) {
            return Err(ResourceError::Creation(format!("engine {} failed to start", index)));
        }
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        Ok(EngineTransit {
            index,
            history: Vec::new(),
        })
    }

    fn bind(&self, transit: EngineTransit) -> Result<Engine, ResourceError> {
        if self.fail_bind_at == Some(transit.index) {
            return Err(ResourceError::Transfer(format!(
                "engine {} could not be unmarshalled",
                transit.index
            )));
        }
        self.counters.bound.fetch_add(1, Ordering::SeqCst);
        Ok(Engine {
            index: transit.index,
            bound_on: thread::current().id(),
            history: Rc::new(RefCell::new(transit.history)),
        })
    }

    fn unbind(&self, engine: Engine) -> EngineTransit {
        if let Some(delay) = self.unbind_delay {
            thread::sleep(delay);
        }
        self.counters.unbound.fetch_add(1, Ordering::SeqCst);
        let history = engine.history.borrow().clone();
        EngineTransit {
            index: engine.index,
            history,
        }
    }

    fn release(&self, transit: EngineTransit) {
        self.counters.released.fetch_add(1, Ordering::SeqCst);
        self.counters.released_indices.lock().unwrap().push(transit.index);
    }
}

/// Small, fast-polling pool config for tests.
pub fn test_config(workers: usize) -> PoolConfig {
    PoolConfig::with_workers(workers).poll_interval(Duration::from_millis(20))
}

/// Start a pool of mock engines and hand back its counters.
pub fn engine_pool(workers: usize) -> (Dispatcher<EngineFactory>, Arc<Counters>) {
    pinpool::logging::init_test();
    let factory = EngineFactory::new();
    let counters = Arc::clone(&factory.counters);
    let pool = Dispatcher::new(test_config(workers), factory).unwrap();
    (pool, counters)
}
