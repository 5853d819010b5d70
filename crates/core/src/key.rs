//! Execution keys.

use serde::{Deserialize, Serialize};

/// Identifier of one idempotent logical operation.
///
/// A key must be stable across retries of "the same" operation: two calls
/// carrying the same key are treated as the same execution, whatever they
/// actually do.
///
/// Keys of the form `<key>-<n>` are derived internally to deduplicate
/// individual retry attempts (see [`attempt`](ExecutionKey::attempt)); that
/// suffix pattern is reserved. A user key that happens to match a derived
/// key can only cause an attempt to be skipped as a duplicate, never a
/// double execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionKey(String);

impl ExecutionKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key deduplicating one numbered attempt at this logical key.
    pub fn attempt(&self, attempts: u32) -> Self {
        Self(format!("{}-{}", self.0, attempts))
    }
}

impl core::fmt::Display for ExecutionKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<String> for ExecutionKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ExecutionKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
