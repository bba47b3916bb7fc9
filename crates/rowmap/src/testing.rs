//! In-memory database fakes for unit tests.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;

use crate::core::{Record, RowLookup, RowSource, SourceReader, Statement, TargetSession, Value};
use crate::error::{MigrateError, Result};

/// Build a record from literal pairs.
pub fn record<const N: usize>(pairs: [(&str, Value); N]) -> Record {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// Writer session that records everything it is asked to do.
#[derive(Debug, Default)]
pub struct MemorySession {
    /// Rows served by `lookup_row`, per table.
    pub lookup_rows: HashMap<String, Vec<Record>>,
    /// Every lookup issued: (table, id column, id).
    pub lookups: Vec<(String, String, Value)>,
    /// Fail every lookup.
    pub fail_lookups: bool,

    /// Responses to `query`, consumed in order; empty once exhausted.
    pub query_results: VecDeque<Vec<Record>>,
    /// Every query issued.
    pub queries: Vec<String>,

    /// Every statement executed.
    pub executed: Vec<Statement>,
    /// Fail the statement with this zero-based index.
    pub fail_execute_at: Option<usize>,
    /// Statements executed per committed transaction.
    pub commits: Vec<usize>,
    /// Transactions started.
    pub begins: usize,
    /// Transactions rolled back.
    pub rollbacks: usize,
    pending: usize,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_lookup_row(&mut self, table: &str, row: Record) {
        self.lookup_rows.entry(table.to_string()).or_default().push(row);
    }

    pub fn push_query_result(&mut self, rows: Vec<Record>) {
        self.query_results.push_back(rows);
    }
}

#[async_trait]
impl RowLookup for MemorySession {
    async fn lookup_row(&mut self, table: &str, id_column: &str, id: &Value) -> Result<Record> {
        self.lookups
            .push((table.to_string(), id_column.to_string(), id.clone()));
        if self.fail_lookups {
            return Err(MigrateError::connection("lookup refused", "memory session"));
        }

        let wanted = id.as_text();
        let found = self.lookup_rows.get(table).and_then(|rows| {
            rows.iter()
                .find(|row| row.get(id_column).and_then(Value::as_text) == wanted)
        });
        Ok(found.cloned().unwrap_or_default())
    }
}

#[async_trait]
impl TargetSession for MemorySession {
    async fn begin(&mut self) -> Result<()> {
        self.begins += 1;
        self.pending = 0;
        Ok(())
    }

    async fn execute(&mut self, stmt: &Statement) -> Result<()> {
        if self.fail_execute_at == Some(self.executed.len()) {
            return Err(MigrateError::transfer("memory", "duplicate key"));
        }
        self.executed.push(stmt.clone());
        self.pending += 1;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.commits.push(self.pending);
        self.pending = 0;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.rollbacks += 1;
        self.pending = 0;
        Ok(())
    }

    async fn query(&mut self, sql: &str) -> Result<Vec<Record>> {
        self.queries.push(sql.to_string());
        Ok(self.query_results.pop_front().unwrap_or_default())
    }
}

/// Streaming reader over a fixed row set.
#[derive(Debug, Default)]
pub struct MemorySource {
    pub rows: Vec<Record>,
    /// Every query a cursor was opened for.
    pub opened: Vec<String>,
    /// Requested size of every fetch.
    pub fetches: Vec<usize>,
}

impl MemorySource {
    pub fn new(rows: Vec<Record>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }
}

struct MemoryCursor<'a> {
    source: &'a mut MemorySource,
    position: usize,
}

#[async_trait]
impl SourceReader for MemorySource {
    async fn open_stream<'a>(&'a mut self, sql: &str) -> Result<Box<dyn RowSource + 'a>> {
        self.opened.push(sql.to_string());
        Ok(Box::new(MemoryCursor {
            source: self,
            position: 0,
        }))
    }
}

#[async_trait]
impl RowSource for MemoryCursor<'_> {
    async fn next_batch(&mut self, max_rows: usize) -> Result<Vec<Record>> {
        self.source.fetches.push(max_rows);
        let end = (self.position + max_rows).min(self.source.rows.len());
        let batch = self.source.rows[self.position..end].to_vec();
        self.position = end;
        Ok(batch)
    }
}
