//! Bounded retries with durable per-key state.
//!
//! [`RetryableOncer`] sits on top of an [`Oncer`] and a [`StateStore`]. Each
//! call runs at most one attempt, dedupes that attempt across concurrent
//! callers through a derived attempt key, and records where the key ended up.
//!
//! ## State machine
//!
//! A key starts at `Init` with zero attempts. Every attempt bumps the count
//! and records `Done`, `Failed`, or `Retry`. `Done` and `Failed` are
//! terminal: later calls return the recorded outcome without running the
//! operation. Once the attempt count would pass the configured limit the key
//! is marked `Failed` and the operation stops being attempted.

use std::future::Future;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::{OnceError, OnceResult};
use crate::key::ExecutionKey;
use crate::once::Oncer;
use crate::state::{ExecutionState, StateValue};
use crate::store::StateStore;

/// What a [`RetryableOncer::execute`] call did for the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// The operation succeeded, now or on an earlier call.
    Done,
    /// The operation failed fatally, now or on an earlier call.
    Failed,
    /// The attempt limit was exceeded before the operation succeeded.
    LimitExceeded,
    /// A concurrent caller holds the current attempt; nothing ran here.
    Retrying,
}

/// Retrying executor with an attempt limit.
///
/// Storage-agnostic: plug in any [`Oncer`] and [`StateStore`] pair. The
/// attempt limit is per instance; every key executed through the same
/// instance shares it.
pub struct RetryableOncer<O, S> {
    oncer: O,
    states: S,
    limit: u32,
}

impl<O, S> RetryableOncer<O, S>
where
    O: Oncer,
    S: StateStore,
{
    /// `limit` is the maximum number of attempts per key. Once a key's
    /// attempt count would pass it, the key is marked failed and the
    /// operation is no longer run.
    pub fn new(oncer: O, states: S, limit: u32) -> Self {
        Self {
            oncer,
            states,
            limit,
        }
    }

    /// Run one attempt of `op` for `key`, honoring recorded state.
    ///
    /// The attempt is deduped across concurrent callers through a per-attempt
    /// key derived with [`ExecutionKey::attempt`]; a caller that loses the
    /// race gets [`ExecutionOutcome::Retrying`] without running `op`.
    ///
    /// Returns `Ok` with the key's outcome when no further work is needed
    /// from this caller, and `Err` when the attempt failed in a way worth
    /// reporting: retryable op failures come back as-is so the caller can
    /// schedule another call, storage failures come back as
    /// [`OnceError::Store`] or [`OnceError::StateRead`].
    #[instrument(skip(self, op), fields(key = %key))]
    pub async fn execute<F, Fut>(&self, key: &ExecutionKey, op: F) -> OnceResult<ExecutionOutcome>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = OnceResult> + Send,
    {
        let current = match self.states.get_state(key).await {
            Ok(state) => state,
            Err(err) => return Err(OnceError::state_read(err.to_string())),
        };

        if current.value.is_terminal() {
            debug!(key = %key, state = ?current.value, "key already terminal, skipping");
            let outcome = if current.value == StateValue::Done {
                ExecutionOutcome::Done
            } else {
                ExecutionOutcome::Failed
            };
            return Ok(outcome);
        }

        let attempts = current.attempts + 1;
        let attempt_key = key.attempt(attempts);

        if attempts > self.limit {
            debug!(key = %key, attempts, limit = self.limit, "attempt limit exceeded");
            let exhausted = ExecutionState::new(attempts, StateValue::Failed);
            let recorded: OnceResult = self
                .oncer
                .execute(&attempt_key, move || async move {
                    self.states.update_state(key, exhausted).await
                })
                .await;
            if let Err(err) = recorded {
                warn!(key = %key, attempts, error = %err, "failed to record exhausted attempts");
            }
            return Ok(ExecutionOutcome::LimitExceeded);
        }

        let outcome = self
            .oncer
            .execute(&attempt_key, move || async move {
                match op().await {
                    Ok(()) => self
                        .states
                        .update_state(key, ExecutionState::new(attempts, StateValue::Done))
                        .await
                        .map(|_| Some(ExecutionOutcome::Done)),
                    Err(err) if err.is_retryable() => {
                        debug!(key = %key, attempts, error = %err, "attempt failed, will retry");
                        let retrying = ExecutionState::new(attempts, StateValue::Retry);
                        if let Err(update_err) = self.states.update_state(key, retrying).await {
                            warn!(
                                key = %key,
                                attempts,
                                error = %update_err,
                                "failed to record retry state"
                            );
                        }
                        Err(err)
                    }
                    Err(err) => {
                        warn!(key = %key, attempts, error = %err, "attempt failed fatally");
                        self.states
                            .update_state(key, ExecutionState::new(attempts, StateValue::Failed))
                            .await
                            .map(|_| Some(ExecutionOutcome::Failed))
                    }
                }
            })
            .await?;

        // None means a concurrent caller claimed this attempt first.
        Ok(outcome.unwrap_or(ExecutionOutcome::Retrying))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::once::Once;
    use crate::store::{ClaimStore, InMemoryClaimStore, InMemoryStateStore};

    struct FailingStateStore;

    #[async_trait]
    impl StateStore for FailingStateStore {
        async fn get_state(&self, _key: &ExecutionKey) -> OnceResult<ExecutionState> {
            Err(OnceError::store("get_state", "connection refused"))
        }

        async fn update_state(&self, _key: &ExecutionKey, _state: ExecutionState) -> OnceResult {
            Err(OnceError::store("update_state", "connection refused"))
        }
    }

    struct ReadOnlyStateStore {
        states: Arc<InMemoryStateStore>,
    }

    #[async_trait]
    impl StateStore for ReadOnlyStateStore {
        async fn get_state(&self, key: &ExecutionKey) -> OnceResult<ExecutionState> {
            self.states.get_state(key).await
        }

        async fn update_state(&self, _key: &ExecutionKey, _state: ExecutionState) -> OnceResult {
            Err(OnceError::store("update_state", "read-only"))
        }
    }

    struct TakenClaimStore;

    #[async_trait]
    impl ClaimStore for TakenClaimStore {
        async fn claim(&self, key: &ExecutionKey) -> OnceResult {
            Err(OnceError::duplicate(key.clone()))
        }
    }

    struct PropagatingClaimStore;

    #[async_trait]
    impl ClaimStore for PropagatingClaimStore {
        async fn claim(&self, key: &ExecutionKey) -> OnceResult {
            Err(OnceError::duplicate_propagate(key.clone()))
        }
    }

    fn counted_ok(
        calls: &Arc<AtomicU32>,
    ) -> impl FnOnce() -> std::future::Ready<OnceResult> + Send {
        let counted = calls.clone();
        move || {
            counted.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn state_read_failure_is_returned_retryable() {
        let executor = RetryableOncer::new(Once::new(InMemoryClaimStore::new()), FailingStateStore, 5);
        let calls = Arc::new(AtomicU32::new(0));

        let result = executor
            .execute(&ExecutionKey::new("order-1"), counted_ok(&calls))
            .await;

        let err = result.unwrap_err();
        assert!(matches!(err, OnceError::StateRead { .. }));
        assert!(err.is_retryable());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn terminal_done_short_circuits() {
        let states = Arc::new(InMemoryStateStore::new());
        let key = ExecutionKey::new("order-1");
        states
            .update_state(&key, ExecutionState::new(2, StateValue::Done))
            .await
            .unwrap();
        let executor = RetryableOncer::new(Once::new(InMemoryClaimStore::new()), states, 5);
        let calls = Arc::new(AtomicU32::new(0));

        let result = executor.execute(&key, counted_ok(&calls)).await;

        assert_eq!(result, Ok(ExecutionOutcome::Done));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn terminal_failed_short_circuits() {
        let states = Arc::new(InMemoryStateStore::new());
        let key = ExecutionKey::new("order-1");
        states
            .update_state(&key, ExecutionState::new(2, StateValue::Failed))
            .await
            .unwrap();
        let executor = RetryableOncer::new(Once::new(InMemoryClaimStore::new()), states, 5);
        let calls = Arc::new(AtomicU32::new(0));

        let result = executor.execute(&key, counted_ok(&calls)).await;

        assert_eq!(result, Ok(ExecutionOutcome::Failed));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn limit_exceeded_records_failed_state() {
        let states = Arc::new(InMemoryStateStore::new());
        let key = ExecutionKey::new("order-1");
        states
            .update_state(&key, ExecutionState::new(5, StateValue::Retry))
            .await
            .unwrap();
        let executor = RetryableOncer::new(Once::new(InMemoryClaimStore::new()), states.clone(), 5);
        let calls = Arc::new(AtomicU32::new(0));

        let result = executor.execute(&key, counted_ok(&calls)).await;

        assert_eq!(result, Ok(ExecutionOutcome::LimitExceeded));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            states.get_state(&key).await.unwrap(),
            ExecutionState::new(6, StateValue::Failed)
        );
    }

    #[tokio::test]
    async fn limit_exceeded_swallows_write_failure() {
        let inner = Arc::new(InMemoryStateStore::new());
        let key = ExecutionKey::new("order-1");
        inner
            .update_state(&key, ExecutionState::new(5, StateValue::Retry))
            .await
            .unwrap();
        let states = ReadOnlyStateStore {
            states: inner.clone(),
        };
        let executor = RetryableOncer::new(Once::new(InMemoryClaimStore::new()), states, 5);
        let calls = Arc::new(AtomicU32::new(0));

        let result = executor.execute(&key, counted_ok(&calls)).await;

        assert_eq!(result, Ok(ExecutionOutcome::LimitExceeded));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            inner.get_state(&key).await.unwrap(),
            ExecutionState::new(5, StateValue::Retry)
        );
    }

    #[tokio::test]
    async fn successful_op_records_done() {
        let states = Arc::new(InMemoryStateStore::new());
        let key = ExecutionKey::new("order-1");
        let executor = RetryableOncer::new(Once::new(InMemoryClaimStore::new()), states.clone(), 5);
        let calls = Arc::new(AtomicU32::new(0));

        let result = executor.execute(&key, counted_ok(&calls)).await;

        assert_eq!(result, Ok(ExecutionOutcome::Done));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            states.get_state(&key).await.unwrap(),
            ExecutionState::new(1, StateValue::Done)
        );
    }

    #[tokio::test]
    async fn retryable_failure_returns_error_and_records_retry() {
        let states = Arc::new(InMemoryStateStore::new());
        let key = ExecutionKey::new("order-1");
        let executor = RetryableOncer::new(Once::new(InMemoryClaimStore::new()), states.clone(), 5);
        let calls = Arc::new(AtomicU32::new(0));

        let counted = calls.clone();
        let result = executor
            .execute(&key, move || async move {
                counted.fetch_add(1, Ordering::SeqCst);
                Err(OnceError::retryable("flaky"))
            })
            .await;

        assert_eq!(result, Err(OnceError::retryable("flaky")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            states.get_state(&key).await.unwrap(),
            ExecutionState::new(1, StateValue::Retry)
        );
    }

    #[tokio::test]
    async fn retry_write_failure_returns_op_error() {
        let states = ReadOnlyStateStore {
            states: Arc::new(InMemoryStateStore::new()),
        };
        let executor = RetryableOncer::new(Once::new(InMemoryClaimStore::new()), states, 5);

        let result = executor
            .execute(&ExecutionKey::new("order-1"), || async {
                Err(OnceError::retryable("flaky"))
            })
            .await;

        assert_eq!(result, Err(OnceError::retryable("flaky")));
    }

    #[tokio::test]
    async fn fatal_failure_records_failed_and_reports_it() {
        let states = Arc::new(InMemoryStateStore::new());
        let key = ExecutionKey::new("order-1");
        let executor = RetryableOncer::new(Once::new(InMemoryClaimStore::new()), states.clone(), 5);
        let calls = Arc::new(AtomicU32::new(0));

        let counted = calls.clone();
        let result = executor
            .execute(&key, move || async move {
                counted.fetch_add(1, Ordering::SeqCst);
                Err(OnceError::fatal("downstream rejected"))
            })
            .await;

        assert_eq!(result, Ok(ExecutionOutcome::Failed));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            states.get_state(&key).await.unwrap(),
            ExecutionState::new(1, StateValue::Failed)
        );
    }

    #[tokio::test]
    async fn fatal_write_failure_surfaces_store_error() {
        let states = ReadOnlyStateStore {
            states: Arc::new(InMemoryStateStore::new()),
        };
        let executor = RetryableOncer::new(Once::new(InMemoryClaimStore::new()), states, 5);

        let result = executor
            .execute(&ExecutionKey::new("order-1"), || async {
                Err(OnceError::fatal("downstream rejected"))
            })
            .await;

        assert!(matches!(
            result,
            Err(OnceError::Store {
                operation: "update_state",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn success_write_failure_surfaces_store_error() {
        let states = ReadOnlyStateStore {
            states: Arc::new(InMemoryStateStore::new()),
        };
        let executor = RetryableOncer::new(Once::new(InMemoryClaimStore::new()), states, 5);
        let calls = Arc::new(AtomicU32::new(0));

        let result = executor
            .execute(&ExecutionKey::new("order-1"), counted_ok(&calls))
            .await;

        assert!(matches!(
            result,
            Err(OnceError::Store {
                operation: "update_state",
                ..
            })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn lost_attempt_race_reports_retrying() {
        let executor = RetryableOncer::new(
            Once::new(TakenClaimStore),
            Arc::new(InMemoryStateStore::new()),
            5,
        );
        let calls = Arc::new(AtomicU32::new(0));

        let result = executor
            .execute(&ExecutionKey::new("order-1"), counted_ok(&calls))
            .await;

        assert_eq!(result, Ok(ExecutionOutcome::Retrying));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn propagating_duplicate_bubbles_up() {
        let executor = RetryableOncer::new(
            Once::new(PropagatingClaimStore),
            Arc::new(InMemoryStateStore::new()),
            5,
        );

        let result = executor
            .execute(&ExecutionKey::new("order-1"), || async { Ok(()) })
            .await;

        assert!(matches!(
            result,
            Err(OnceError::Duplicate {
                propagate: true,
                ..
            })
        ));
    }
}
