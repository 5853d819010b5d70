//! Postgres-backed stores for `idemkey-core`.
//!
//! ## Storage Layout
//!
//! Claims and execution state share one table (default name `executions`):
//!
//! | Column | Type | Meaning |
//! |--------|------|---------|
//! | `id` | `TEXT PRIMARY KEY` | execution or attempt key |
//! | `state` | `SMALLINT` | 1 = init, 2 = done, 3 = failed, 4 = retry |
//! | `attempts` | `INTEGER` | attempts recorded so far |
//!
//! A claim is an `INSERT` of the bare key; the primary key turns a second
//! insert into a unique violation, which is how duplicates are detected.
//! State writes are upserts keyed by the same column.
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to `OnceError` as follows:
//!
//! | SQLx Error | PostgreSQL Error Code | OnceError | Scenario |
//! |------------|----------------------|-----------|----------|
//! | Database (unique violation) | `23505` | `Duplicate` | Key already claimed |
//! | Database (other) | Any other | `Store` | Other database errors |
//! | PoolClosed | N/A | `Store` | Connection pool was closed |
//! | Other | N/A | `Store` | Network errors, connection failures, etc. |
//!
//! Duplicate detection for other engines goes through [`ErrorTranslator`];
//! the default [`PgErrorTranslator`] knows the Postgres code.
//!
//! ## Thread Safety
//!
//! All stores are `Send + Sync` and can be shared across tasks. Operations
//! use the SQLx connection pool, which handles connection management.

pub mod claim;
pub mod repository;
pub mod state;
pub mod translate;

pub use claim::PostgresClaimStore;
pub use repository::PostgresRepository;
pub use state::PostgresStateStore;
pub use translate::{ErrorTranslator, PgErrorTranslator};

/// Table used when a store is built without [`with_table`].
///
/// [`with_table`]: PostgresClaimStore::with_table
pub const DEFAULT_TABLE: &str = "executions";

/// DDL for the default table.
///
/// The column defaults matter: a claim inserts only `id`, so `state` and
/// `attempts` must default to the never-attempted values.
pub const SCHEMA_SQL: &str = "CREATE TABLE IF NOT EXISTS executions (
    id TEXT PRIMARY KEY,
    state SMALLINT NOT NULL DEFAULT 1,
    attempts INTEGER NOT NULL DEFAULT 0
)";
