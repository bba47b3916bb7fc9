//! Core traits for the database handles the engine consumes.
//!
//! The conversion engine, migration driver and verifier never talk to a
//! driver directly. They go through three seams:
//!
//! - [`RowLookup`]: point lookups used by `+db+` key expressions
//! - [`SourceReader`] / [`RowSource`]: unbuffered streaming reads
//! - [`TargetSession`]: the single writable session and transaction boundary
//!
//! The MySQL driver implements all of them; tests use in-memory fakes.

use async_trait::async_trait;

use crate::error::Result;

use super::value::{Record, Value};

/// A statement with positional (`?`) parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// SQL text.
    pub sql: String,
    /// Values bound to the placeholders, in order.
    pub params: Vec<Value>,
}

impl Statement {
    /// Create a statement.
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// Point lookup of a single row by an id column.
///
/// Lookups are executed eagerly, once per call, without caching.
#[async_trait]
pub trait RowLookup: Send {
    /// Fetch the first row of `table` whose `id_column` equals `id`
    /// (compared as text). Returns an empty record when nothing matches.
    async fn lookup_row(&mut self, table: &str, id_column: &str, id: &Value) -> Result<Record>;
}

/// A cursor yielding rows incrementally.
#[async_trait]
pub trait RowSource: Send {
    /// Fetch up to `max_rows` rows. A batch shorter than `max_rows` means
    /// the cursor is exhausted.
    async fn next_batch(&mut self, max_rows: usize) -> Result<Vec<Record>>;
}

/// A read-only handle able to open unbuffered streaming cursors.
#[async_trait]
pub trait SourceReader: Send {
    /// Execute `sql` and return a cursor over its rows.
    ///
    /// The cursor borrows the reader; only one can be open at a time.
    async fn open_stream<'a>(&'a mut self, sql: &str) -> Result<Box<dyn RowSource + 'a>>;
}

/// The writable session: the sole writer and sole transaction boundary.
///
/// Lookups issued during conversion run on the same session.
#[async_trait]
pub trait TargetSession: RowLookup {
    /// Start a transaction.
    async fn begin(&mut self) -> Result<()>;

    /// Execute one statement.
    async fn execute(&mut self, stmt: &Statement) -> Result<()>;

    /// Commit the current transaction.
    async fn commit(&mut self) -> Result<()>;

    /// Discard the current transaction.
    async fn rollback(&mut self) -> Result<()>;

    /// Run a query and buffer all resulting rows.
    async fn query(&mut self, sql: &str) -> Result<Vec<Record>>;

    /// Run a query and return its first row, if any.
    ///
    /// Template method over [`query`](TargetSession::query).
    async fn query_first(&mut self, sql: &str) -> Result<Option<Record>> {
        Ok(self.query(sql).await?.into_iter().next())
    }
}
