//! `idemkey-core` — at-most-once execution keyed by idempotency keys.
//!
//! The building blocks, leaves first: [`ClaimStore`] and [`StateStore`] are
//! the storage contracts, [`Once`] turns a claim store into an at-most-once
//! executor, and [`RetryableOncer`] adds bounded retries with durable
//! per-key state on top. Everything here is storage-agnostic; the in-memory
//! stores back tests and single-process use.

pub mod error;
pub mod key;
pub mod once;
pub mod retry;
pub mod state;
pub mod store;


pub use error::{OnceError, OnceResult};
pub use key::ExecutionKey;
pub use once::{Once, Oncer};
pub use retry::{ExecutionOutcome, RetryableOncer};
pub use state::{ExecutionState, StateValue};
pub use store::{ClaimStore, InMemoryClaimStore, InMemoryStateStore, StateStore};
