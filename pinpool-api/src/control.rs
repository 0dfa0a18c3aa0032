use async_trait::async_trait;

/// Pool-wide control operations requested out of band, typically by an
/// operator command arriving through the notification layer.
///
/// Pausing stops new submissions from being enqueued; tasks that are already
/// running finish normally.
#[async_trait]
pub trait PoolControl: Send + Sync {
    /// Close the admission gate. Returns `false` if the pool was already paused.
    async fn pause(&self) -> bool;

    /// Reopen the admission gate. Returns `false` if the pool was not paused.
    async fn resume(&self) -> bool;

    fn is_paused(&self) -> bool;
}
