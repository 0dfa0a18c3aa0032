//! # Notification Layer
//!
//! In-process half of the observer channel: a [`Broadcaster`] fanning pool
//! events out to every subscriber, and a [`CommandRouter`] turning raw inbound
//! messages into pool control calls. The network transport that carries these
//! to remote clients lives outside this crate and is wired in by the caller.

pub mod broadcaster;
pub mod router;

pub use broadcaster::{Broadcaster, Subscription};
pub use router::CommandRouter;
