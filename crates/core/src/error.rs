//! Error types shared across the crate.

use thiserror::Error;

use crate::key::ExecutionKey;

/// Result alias used throughout the crate. Defaults to `()` because most
/// storage operations only report success or failure.
pub type OnceResult<T = ()> = Result<T, OnceError>;

/// Errors surfaced by stores and executors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OnceError {
    /// The key was already claimed by an earlier caller.
    ///
    /// `propagate` controls what [`crate::Once`] does with it: `false` means
    /// swallow the duplicate and report success, `true` means surface it to
    /// the caller.
    #[error("duplicate execution: {key}")]
    Duplicate { key: ExecutionKey, propagate: bool },

    /// A storage operation failed.
    #[error("{operation} failed: {message}")]
    Store {
        operation: &'static str,
        message: String,
    },

    /// Reading execution state failed. Treated as retryable: the caller
    /// could not learn whether the key is terminal, so trying again later
    /// is safe.
    #[error("state read failed: {message}")]
    StateRead { message: String },

    /// The operation failed in a way that is expected to succeed on a
    /// later attempt.
    #[error("retryable failure: {message}")]
    Retryable { message: String },

    /// The operation failed in a way that retrying cannot fix.
    #[error("fatal failure: {message}")]
    Fatal { message: String },
}

impl OnceError {
    pub fn duplicate(key: ExecutionKey) -> Self {
        OnceError::Duplicate {
            key,
            propagate: false,
        }
    }

    pub fn duplicate_propagate(key: ExecutionKey) -> Self {
        OnceError::Duplicate {
            key,
            propagate: true,
        }
    }

    pub fn store(operation: &'static str, message: impl Into<String>) -> Self {
        OnceError::Store {
            operation,
            message: message.into(),
        }
    }

    pub fn state_read(message: impl Into<String>) -> Self {
        OnceError::StateRead {
            message: message.into(),
        }
    }

    pub fn retryable(message: impl Into<String>) -> Self {
        OnceError::Retryable {
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        OnceError::Fatal {
            message: message.into(),
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, OnceError::Duplicate { .. })
    }

    pub fn should_propagate(&self) -> bool {
        matches!(self, OnceError::Duplicate { propagate: true, .. })
    }

    /// Whether a later attempt for the same key may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OnceError::Retryable { .. } | OnceError::StateRead { .. }
        )
    }
}
