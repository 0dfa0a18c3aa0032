// Pinpool
//
// A fixed pool of worker threads, each owning exactly one handle to an
// external resource that must never be touched from two threads. Callers submit
// tasks targeted at a subset of workers and get back one report per worker.

pub mod logging;
pub mod notify;
pub mod pool;

// Re-export commonly used types
pub use notify::{Broadcaster, CommandRouter, Subscription};
pub use pool::*;
pub use pinpool_api::{
    ClosureFactory, InboundCommand, Notification, NotificationSink, PoolControl, ResourceError,
    ResourceFactory,
};
