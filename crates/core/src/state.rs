//! Execution state machine types.

use serde::{Deserialize, Serialize};

/// Position of a key in the retry state machine.
///
/// A key moves `Init → {Retry | Done | Failed}` and `Retry → {Retry | Done |
/// Failed}`. `Done` and `Failed` are terminal: once reached, further calls
/// for the key are no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateValue {
    /// Never attempted
    Init,
    /// At least one attempt failed retryably; more may follow
    Retry,
    /// An attempt succeeded
    Done,
    /// An attempt failed fatally, or the attempt limit was exceeded
    Failed,
}

impl StateValue {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StateValue::Done | StateValue::Failed)
    }
}

/// Durable per-key execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionState {
    /// Number of attempts recorded so far.
    pub attempts: u32,
    /// Current state machine position.
    pub value: StateValue,
}

impl ExecutionState {
    pub fn new(attempts: u32, value: StateValue) -> Self {
        Self { attempts, value }
    }
}

impl Default for ExecutionState {
    /// State of a key that has never been seen: zero attempts, `Init`.
    fn default() -> Self {
        Self {
            attempts: 0,
            value: StateValue::Init,
        }
    }
}
