use std::fmt;
use std::sync::Mutex;

use serde_json::{Map, Value};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

use pinpool_api::notify::{Notification, NotificationSink};

use crate::pool::config::NotifyConfig;
use crate::pool::error::PoolError;
use crate::pool::worker::lock;

/// Fans notifications out to every subscriber and keeps a snapshot of the
/// application state.
///
/// State notifications carrying a JSON object are merged into the snapshot,
/// so a late subscriber starts from the same state everyone else has seen.
pub struct Broadcaster {
    sender: broadcast::Sender<Notification>,
    /// Guards merge-then-send so a new subscriber never misses or repeats an update
    state: Mutex<Map<String, Value>>,
    debug: bool,
}

impl fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Broadcaster")
            .field("subscribers", &self.sender.receiver_count())
            .field("state", &*lock(&self.state))
            .finish()
    }
}

impl Broadcaster {
    pub fn new(config: &NotifyConfig) -> Result<Self, PoolError> {
        Self::with_state(config, Map::new())
    }

    /// Create a broadcaster whose snapshot starts as `state`.
    pub fn with_state(config: &NotifyConfig, state: Map<String, Value>) -> Result<Self, PoolError> {
        config.validate()?;
        let (sender, _) = broadcast::channel(config.channel_capacity);
        Ok(Self {
            sender,
            state: Mutex::new(state),
            debug: config.debug,
        })
    }

    /// Subscribe to future notifications, starting with the full state snapshot.
    pub fn subscribe(&self) -> Subscription {
        let state = lock(&self.state);
        let receiver = self.sender.subscribe();
        tracing::info!(subscribers = self.sender.receiver_count(), "observer subscribed");
        Subscription {
            initial: Some(Notification::state_map(200, state.clone())),
            receiver,
        }
    }

    pub fn snapshot(&self) -> Map<String, Value> {
        lock(&self.state).clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl NotificationSink for Broadcaster {
    fn notify(&self, notification: Notification) {
        let mut state = lock(&self.state);
        if let Some(Value::Object(update)) = notification.state_value() {
            for (key, value) in update {
                state.insert(key.clone(), value.clone());
            }
        }

        if self.debug {
            tracing::debug!(notification = %notification, "broadcast");
        }
        // No subscribers is not an error; the snapshot still holds the state.
        let _ = self.sender.send(notification);
    }
}

/// One observer's view of the notification stream.
pub struct Subscription {
    initial: Option<Notification>,
    receiver: broadcast::Receiver<Notification>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("snapshot_pending", &self.initial.is_some())
            .finish()
    }
}

impl Subscription {
    /// Next notification, or `None` once the broadcaster is gone.
    ///
    /// A subscriber that falls more than the channel capacity behind skips the
    /// notifications it missed.
    pub async fn recv(&mut self) -> Option<Notification> {
        if let Some(initial) = self.initial.take() {
            return Some(initial);
        }
        loop {
            match self.receiver.recv().await {
                Ok(notification) => return Some(notification),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "observer lagged behind");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<Notification> {
        if let Some(initial) = self.initial.take() {
            return Some(initial);
        }
        loop {
            match self.receiver.try_recv() {
                Ok(notification) => return Some(notification),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "observer lagged behind");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }
}
