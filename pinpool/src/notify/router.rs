use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use pinpool_api::control::PoolControl;
use pinpool_api::notify::{InboundCommand, Notification};

/// Routes raw inbound messages from observers.
///
/// Pause and resume commands are applied to the pool. Any other JSON message
/// is forwarded unmodified to the passthrough channel, where the application
/// picks it up as work to submit.
pub struct CommandRouter {
    control: Arc<dyn PoolControl>,
    passthrough: flume::Sender<Value>,
}

impl fmt::Debug for CommandRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRouter")
            .field("paused", &self.control.is_paused())
            .finish()
    }
}

impl CommandRouter {
    pub fn new(control: Arc<dyn PoolControl>, passthrough: flume::Sender<Value>) -> Self {
        Self { control, passthrough }
    }

    /// Handle one raw message.
    ///
    /// Returns a reply meant only for the observer that sent the message, if any.
    pub async fn handle(&self, raw: &str) -> Option<Notification> {
        match InboundCommand::parse(raw) {
            Ok(InboundCommand::Pause) => {
                self.control.pause().await;
                None
            }
            Ok(InboundCommand::Resume) => {
                self.control.resume().await;
                None
            }
            Ok(InboundCommand::Other(message)) => {
                if self.passthrough.send(message).is_err() {
                    tracing::warn!("no consumer for inbound messages, dropping");
                }
                None
            }
            Err(e) => {
                tracing::debug!(error = %e, "rejected inbound message");
                Some(Notification::message(400, "Invalid JSON"))
            }
        }
    }
}
