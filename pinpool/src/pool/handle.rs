//! # Resource Handles
//!
//! A resource handle is always in exactly one of two states:
//!
//! - [`TransitHandle`]: the thread-agnostic transfer form. It is `Send` and
//!   holds no live reference, so it can be moved from the constructing context
//!   into a worker thread and back out again at teardown.
//! - [`BoundHandle`]: the live reference, pinned to the thread that bound it.
//!   It is `!Send` and `!Sync`, so the compiler rejects any attempt to hand it
//!   to another thread.
//!
//! Each transition consumes the previous state, so a handle cannot be bound
//! twice or used after it has been unbound.

use std::fmt;
use std::marker::PhantomData;
use std::thread::{self, ThreadId};

use pinpool_api::resource::ResourceFactory;

use crate::pool::error::PoolError;

/// A resource in its transfer form, tagged with the worker it belongs to.
pub struct TransitHandle<T> {
    index: usize,
    transit: T,
}

impl<T> fmt::Debug for TransitHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitHandle")
            .field("index", &self.index)
            .finish()
    }
}

impl<T: Send + 'static> TransitHandle<T> {
    /// Create the external resource for worker `index` in the calling context.
    pub fn create<F>(factory: &F, index: usize) -> Result<Self, PoolError>
    where
        F: ResourceFactory<Transit = T>,
    {
        let transit = factory
            .create(index)
            .map_err(|source| PoolError::ResourceCreation { index, source })?;
        tracing::debug!(index, "resource created");
        Ok(Self { index, transit })
    }

    /// Worker index this handle was created for.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Turn the transit form into a live reference owned by the calling thread.
    pub fn bind<F>(self, factory: &F) -> Result<BoundHandle<F::Resource>, PoolError>
    where
        F: ResourceFactory<Transit = T>,
    {
        let index = self.index;
        let resource = factory.bind(self.transit).map_err(|e| {
            PoolError::TransferProtocol(format!("failed to bind resource {}: {}", index, e))
        })?;
        Ok(BoundHandle {
            index,
            owner: thread::current().id(),
            resource,
            _not_send: PhantomData,
        })
    }

    /// Destroy the external resource.
    pub fn release<F>(self, factory: &F)
    where
        F: ResourceFactory<Transit = T>,
    {
        factory.release(self.transit);
        tracing::debug!(index = self.index, "resource released");
    }

    /// Borrow the transfer form.
    pub fn transit(&self) -> &T {
        &self.transit
    }
}

/// A live resource reference owned by exactly one thread.
pub struct BoundHandle<R> {
    index: usize,
    owner: ThreadId,
    resource: R,
    _not_send: PhantomData<*const ()>,
}

impl<R> fmt::Debug for BoundHandle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundHandle")
            .field("index", &self.index)
            .field("owner", &self.owner)
            .finish()
    }
}

impl<R> BoundHandle<R> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    pub fn resource(&self) -> &R {
        self.assert_owner();
        &self.resource
    }

    pub fn resource_mut(&mut self) -> &mut R {
        self.assert_owner();
        &mut self.resource
    }

    /// Convert back into the transfer form. Must run on the owning thread.
    pub fn unbind<F>(self, factory: &F) -> TransitHandle<F::Transit>
    where
        F: ResourceFactory<Resource = R>,
    {
        self.assert_owner();
        TransitHandle {
            index: self.index,
            transit: factory.unbind(self.resource),
        }
    }

    #[inline]
    fn assert_owner(&self) {
        debug_assert_eq!(
            thread::current().id(),
            self.owner,
            "resource {} used outside its owning thread",
            self.index
        );
    }
}
