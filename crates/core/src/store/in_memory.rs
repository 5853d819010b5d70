//! In-memory store implementations.
//!
//! Intended for tests and single-process use. Claims and state live in the
//! instance, so two instances never see each other's keys.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{OnceError, OnceResult};
use crate::key::ExecutionKey;
use crate::state::ExecutionState;
use crate::store::{ClaimStore, StateStore};

/// In-memory [`ClaimStore`] backed by a `HashSet`.
#[derive(Debug, Default)]
pub struct InMemoryClaimStore {
    claims: RwLock<HashSet<ExecutionKey>>,
}

impl InMemoryClaimStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClaimStore for InMemoryClaimStore {
    async fn claim(&self, key: &ExecutionKey) -> OnceResult {
        let mut claims = self
            .claims
            .write()
            .map_err(|_| OnceError::store("claim", "lock poisoned"))?;
        if !claims.insert(key.clone()) {
            return Err(OnceError::duplicate(key.clone()));
        }
        Ok(())
    }
}

/// In-memory [`StateStore`] backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    states: RwLock<HashMap<ExecutionKey, ExecutionState>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn get_state(&self, key: &ExecutionKey) -> OnceResult<ExecutionState> {
        let states = self
            .states
            .read()
            .map_err(|_| OnceError::store("get_state", "lock poisoned"))?;
        Ok(states.get(key).copied().unwrap_or_default())
    }

    async fn update_state(&self, key: &ExecutionKey, state: ExecutionState) -> OnceResult {
        let mut states = self
            .states
            .write()
            .map_err(|_| OnceError::store("update_state", "lock poisoned"))?;
        states.insert(key.clone(), state);
        Ok(())
    }
}
