//! At-most-once execution over a claim store.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::OnceResult;
use crate::key::ExecutionKey;
use crate::store::ClaimStore;

/// Runs an operation at most once per key.
#[async_trait]
pub trait Oncer: Send + Sync {
    /// Claim `key`, then run `op` if the claim succeeded.
    ///
    /// When the key was already claimed and the duplicate is not flagged for
    /// propagation, the call reports success with `T::default()` and `op`
    /// never runs. `T` is typically `()` or an `Option` whose `None` tells
    /// the caller the operation was skipped.
    async fn execute<T, F, Fut>(&self, key: &ExecutionKey, op: F) -> OnceResult<T>
    where
        T: Default + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = OnceResult<T>> + Send;
}

#[async_trait]
impl<O> Oncer for Arc<O>
where
    O: Oncer + ?Sized,
{
    async fn execute<T, F, Fut>(&self, key: &ExecutionKey, op: F) -> OnceResult<T>
    where
        T: Default + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = OnceResult<T>> + Send,
    {
        (**self).execute(key, op).await
    }
}

/// [`Oncer`] backed by a [`ClaimStore`].
///
/// The claim is taken before the operation runs and is never rolled back.
/// An operation that fails after its key was claimed stays claimed, so a
/// later call for the same key is a duplicate and will not run it again.
pub struct Once<C> {
    claims: C,
}

impl<C> Once<C>
where
    C: ClaimStore,
{
    pub fn new(claims: C) -> Self {
        Self { claims }
    }
}

#[async_trait]
impl<C> Oncer for Once<C>
where
    C: ClaimStore,
{
    async fn execute<T, F, Fut>(&self, key: &ExecutionKey, op: F) -> OnceResult<T>
    where
        T: Default + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = OnceResult<T>> + Send,
    {
        match self.claims.claim(key).await {
            Ok(()) => op().await,
            Err(err) if err.is_duplicate() && !err.should_propagate() => {
                debug!(key = %key, "duplicate claim swallowed");
                Ok(T::default())
            }
            Err(err) => Err(err),
        }
    }
}
