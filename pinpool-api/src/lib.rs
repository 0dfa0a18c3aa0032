//! # Pinpool API
//!
//! Interfaces between a pool of thread-pinned workers and the collaborators
//! that live outside of it:
//!
//! - [`resource`]: how an external, thread-affine resource is created, moved
//!   into the worker thread that owns it, and finally released
//! - [`notify`]: the notification sink the pool reports to and the inbound
//!   control commands it understands
//! - [`control`]: the pause/resume surface the notification layer drives
//! - [`errors`]: error types shared by the above

pub mod control;
pub mod errors;
pub mod notify;
pub mod resource;

pub use control::PoolControl;
pub use errors::{NotificationError, ResourceError};
pub use notify::{InboundCommand, Notification, NotificationSink};
pub use resource::{ClosureFactory, ResourceFactory};
