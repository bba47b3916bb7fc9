//! MySQL streaming reader.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Conn, QueryResult, TextProtocol};
use tracing::debug;

use crate::config::ConnectionConfig;
use crate::core::{Record, RowSource, SourceReader};
use crate::error::Result;

use super::value::row_to_record;

/// Read-only connection used exclusively for streaming source rows.
pub struct MysqlReader {
    conn: Conn,
}

impl MysqlReader {
    /// Open the reader connection.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let conn = super::connect(config, "reader").await?;
        Ok(Self { conn })
    }

    /// Round-trip a trivial query, returning the latency.
    pub async fn ping(&mut self) -> Result<Duration> {
        let start = Instant::now();
        self.conn.query_drop("SELECT 1").await?;
        Ok(start.elapsed())
    }

    /// Close the connection.
    pub async fn close(self) -> Result<()> {
        self.conn.disconnect().await?;
        Ok(())
    }
}

#[async_trait]
impl SourceReader for MysqlReader {
    async fn open_stream<'a>(&'a mut self, sql: &str) -> Result<Box<dyn RowSource + 'a>> {
        debug!("Opening stream: {}", sql);
        let result = self.conn.query_iter(sql.to_string()).await?;
        Ok(Box::new(MysqlStream { result }))
    }
}

/// Unbuffered cursor: rows are pulled off the wire as batches are requested.
struct MysqlStream<'a> {
    result: QueryResult<'a, 'static, TextProtocol>,
}

#[async_trait]
impl RowSource for MysqlStream<'_> {
    async fn next_batch(&mut self, max_rows: usize) -> Result<Vec<Record>> {
        let mut batch = Vec::with_capacity(max_rows);
        while batch.len() < max_rows {
            match self.result.next().await? {
                Some(row) => batch.push(row_to_record(row)),
                None => break,
            }
        }
        Ok(batch)
    }
}
