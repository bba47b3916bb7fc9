//! MySQL writer session.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Conn, Params, Row};
use tracing::debug;

use crate::config::ConnectionConfig;
use crate::core::identifier::{quote_ident, quote_path};
use crate::core::{Record, RowLookup, Statement, TargetSession, Value};
use crate::error::Result;

use super::value::{row_to_record, to_mysql, to_mysql_text};

/// The single writable connection.
///
/// Runs every write, every transaction, the verifier's queries and the
/// `+db+` lookups made during conversion.
pub struct MysqlSession {
    conn: Conn,
}

impl MysqlSession {
    /// Open the writer connection.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let conn = super::connect(config, "writer").await?;
        Ok(Self { conn })
    }

    /// Enable or disable foreign-key checks for this session.
    pub async fn set_foreign_key_checks(&mut self, enabled: bool) -> Result<()> {
        let sql = format!("SET FOREIGN_KEY_CHECKS={}", u8::from(enabled));
        debug!("{}", sql);
        self.conn.query_drop(sql).await?;
        Ok(())
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
impl RowLookup for MysqlSession {
    async fn lookup_row(&mut self, table: &str, id_column: &str, id: &Value) -> Result<Record> {
        let sql = format!(
            "SELECT * FROM {} WHERE {} = ? LIMIT 1",
            quote_path(table),
            quote_ident(id_column)
        );
        let row: Option<Row> = self
            .conn
            .exec_first(sql, Params::Positional(vec![to_mysql_text(id)]))
            .await?;
        Ok(row.map(row_to_record).unwrap_or_default())
    }
}

#[async_trait]
impl TargetSession for MysqlSession {
    async fn begin(&mut self) -> Result<()> {
        self.conn.query_drop("START TRANSACTION").await?;
        Ok(())
    }

    async fn execute(&mut self, stmt: &Statement) -> Result<()> {
        let params: Vec<_> = stmt.params.iter().map(to_mysql).collect();
        self.conn
            .exec_drop(stmt.sql.as_str(), Params::Positional(params))
            .await?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.conn.query_drop("COMMIT").await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.conn.query_drop("ROLLBACK").await?;
        Ok(())
    }

    async fn query(&mut self, sql: &str) -> Result<Vec<Record>> {
        let rows: Vec<Row> = self.conn.query(sql).await?;
        Ok(rows.into_iter().map(row_to_record).collect())
    }
}
