//! # Pause Gate
//!
//! A binary admission gate built on a one-permit semaphore. Submissions hold
//! the permit only while enqueueing, so closing the gate stops new work from
//! entering worker queues without touching tasks that are already running.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore, SemaphorePermit};

use crate::pool::error::PoolError;

pub struct PauseGate {
    semaphore: Arc<Semaphore>,
    /// The permit held while paused. At most one actor can hold it.
    held: Mutex<Option<OwnedSemaphorePermit>>,
    paused: AtomicBool,
}

impl fmt::Debug for PauseGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PauseGate")
            .field("paused", &self.is_paused())
            .field("closed", &self.semaphore.is_closed())
            .finish()
    }
}

impl PauseGate {
    pub fn new(start_paused: bool) -> Self {
        let semaphore = Arc::new(Semaphore::new(1));
        let held = if start_paused {
            // A fresh semaphore always has its single permit available.
            Arc::clone(&semaphore).try_acquire_owned().ok()
        } else {
            None
        };
        Self {
            semaphore,
            paused: AtomicBool::new(held.is_some()),
            held: Mutex::new(held),
        }
    }

    /// Wait until the gate is open and take the permit for an enqueue phase.
    ///
    /// Fails with [`PoolError::NotRunning`] once the gate has been closed for good.
    pub async fn admit(&self) -> Result<SemaphorePermit<'_>, PoolError> {
        self.semaphore
            .acquire()
            .await
            .map_err(|_| PoolError::NotRunning)
    }

    /// Take and keep the permit. Returns `false` if already paused.
    pub async fn pause(&self) -> bool {
        let mut held = self.held.lock().await;
        if held.is_some() {
            return false;
        }
        match Arc::clone(&self.semaphore).acquire_owned().await {
            Ok(permit) => {
                *held = Some(permit);
                self.paused.store(true, Ordering::SeqCst);
                true
            }
            // Closed gates admit nobody anyway
            Err(_) => false,
        }
    }

    /// Give the permit back. Returns `false` if not paused.
    pub async fn resume(&self) -> bool {
        let mut held = self.held.lock().await;
        match held.take() {
            Some(permit) => {
                drop(permit);
                self.paused.store(false, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Permanently close the gate; pending and future admissions fail.
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }
}
