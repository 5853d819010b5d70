//! Storage contracts for claims and execution state.
//!
//! [`ClaimStore`] is the at-most-once primitive: a durable set of keys where
//! insertion succeeds exactly once. [`StateStore`] holds the per-key retry
//! state. Implementations are expected to be shared across tasks, so both
//! traits take `&self` and require `Send + Sync`.

pub mod in_memory;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::OnceResult;
use crate::key::ExecutionKey;
use crate::state::ExecutionState;

pub use in_memory::{InMemoryClaimStore, InMemoryStateStore};

/// Durable registry of claimed keys.
#[async_trait]
pub trait ClaimStore: Send + Sync {
    /// Record `key` as claimed.
    ///
    /// Exactly one caller per key gets `Ok(())`; every later call returns
    /// [`OnceError::Duplicate`](crate::OnceError::Duplicate). A claim is
    /// never rolled back, even when the work it guards fails.
    async fn claim(&self, key: &ExecutionKey) -> OnceResult;
}

#[async_trait]
impl<S> ClaimStore for Arc<S>
where
    S: ClaimStore + ?Sized,
{
    async fn claim(&self, key: &ExecutionKey) -> OnceResult {
        (**self).claim(key).await
    }
}

/// Durable per-key execution state.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read the state recorded for `key`.
    ///
    /// A key that has never been written reads as
    /// [`ExecutionState::default`], not as an error.
    async fn get_state(&self, key: &ExecutionKey) -> OnceResult<ExecutionState>;

    /// Overwrite the state recorded for `key`.
    async fn update_state(&self, key: &ExecutionKey, state: ExecutionState) -> OnceResult;
}

#[async_trait]
impl<S> StateStore for Arc<S>
where
    S: StateStore + ?Sized,
{
    async fn get_state(&self, key: &ExecutionKey) -> OnceResult<ExecutionState> {
        (**self).get_state(key).await
    }

    async fn update_state(&self, key: &ExecutionKey, state: ExecutionState) -> OnceResult {
        (**self).update_state(key, state).await
    }
}
