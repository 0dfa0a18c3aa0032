//! # Resource Creation Interface
//!
//! An external resource (for example an automation handle to a simulation
//! engine) may only be used from a single thread at a time. The pool never
//! shares it: each resource is created in the constructing context, converted
//! into a thread-agnostic *transit* form, moved into the worker thread that will
//! own it, and *bound* there into a live reference.
//!
//! ## Lifecycle
//!
//! ```text
//! create(index) -> Transit --bind--> Resource --unbind--> Transit --release-->
//! ```
//!
//! `Resource` carries no `Send` bound: the live reference never leaves the
//! thread that bound it. Only `Transit` crosses threads.

use std::fmt;
use std::marker::PhantomData;

use crate::errors::ResourceError;

/// Creates, transfers and releases the external resources owned by pool workers.
pub trait ResourceFactory: Send + Sync + 'static {
    /// Live, thread-pinned reference handed to task bodies.
    type Resource: 'static;

    /// Thread-agnostic transfer form of a resource.
    type Transit: Send + 'static;

    /// Instantiate the resource for worker `index` and return its transit form.
    ///
    /// Called from the context that constructs the pool. May be slow.
    fn create(&self, index: usize) -> Result<Self::Transit, ResourceError>;

    /// Turn a transit form into a live reference.
    ///
    /// Always called from inside the worker thread that will own the result.
    fn bind(&self, transit: Self::Transit) -> Result<Self::Resource, ResourceError>;

    /// Inverse of [`bind`](Self::bind), called from the owning thread before it exits.
    fn unbind(&self, resource: Self::Resource) -> Self::Transit;

    /// Destroy the external resource. Called exactly once per created resource.
    fn release(&self, transit: Self::Transit);
}

/// Factory for resources that are already `Send`.
///
/// Transfer is the identity and release simply drops the value. Useful for
/// resources without thread affinity and for wiring the pool up in tests.
pub struct ClosureFactory<T, C> {
    create: C,
    _resource: PhantomData<fn() -> T>,
}

impl<T, C> ClosureFactory<T, C>
where
    T: Send + 'static,
    C: Fn(usize) -> Result<T, ResourceError> + Send + Sync + 'static,
{
    pub fn new(create: C) -> Self {
        Self {
            create,
            _resource: PhantomData,
        }
    }
}

impl<T, C> fmt::Debug for ClosureFactory<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClosureFactory")
            .field("resource", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T, C> ResourceFactory for ClosureFactory<T, C>
where
    T: Send + 'static,
    C: Fn(usize) -> Result<T, ResourceError> + Send + Sync + 'static,
{
    type Resource = T;
    type Transit = T;

    fn create(&self, index: usize) -> Result<T, ResourceError> {
        (self.create)(index)
    }

    fn bind(&self, transit: T) -> Result<T, ResourceError> {
        Ok(transit)
    }

    fn unbind(&self, resource: T) -> T {
        resource
    }

    fn release(&self, transit: T) {
        drop(transit);
    }
}
