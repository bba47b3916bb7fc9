//! Batch migration driver.
//!
//! Streams source rows through a single unbuffered cursor, converts each one
//! and writes it with its own INSERT or UPDATE. Every fetched batch runs in
//! one transaction on the writer session and is committed before the next
//! fetch, so memory stays bounded by the batch size and an interrupted run
//! leaves all earlier batches in place.

pub mod statement;

pub use statement::{build_insert, build_statement, build_update};

use std::time::Instant;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::MappingSpec;
use crate::convert::Convertor;
use crate::core::identifier::{qualify_mysql, quote_ident};
use crate::core::{Record, SourceReader, TargetSession};
use crate::error::{MigrateError, Result};
use crate::progress::{Phase, ProgressUpdate};

/// Rows fetched (and committed) per batch.
pub const DEFAULT_BATCH_SIZE: usize = 200;

/// Transfer engine configuration.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Rows per fetch and per transaction.
    pub batch_size: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// One table-to-table migration, with identifiers already qualified.
#[derive(Debug, Clone)]
pub struct TransferJob {
    /// `` `db`.`table` `` of the source.
    pub source_table: String,
    /// `` `db`.`table` `` of the destination.
    pub target_table: String,
    /// Source row predicate.
    pub where_clause: String,
    /// Destination field keying UPDATEs.
    pub update_by: Option<String>,
    /// Row cap.
    pub limit: Option<u64>,
}

impl TransferJob {
    /// Build a job from a mapping and the two database names.
    pub fn new(mapping: &MappingSpec, source_db: &str, target_db: &str) -> Result<Self> {
        Ok(Self {
            source_table: qualify_mysql(source_db, &mapping.from)?,
            target_table: qualify_mysql(target_db, &mapping.to)?,
            where_clause: mapping.where_clause.clone(),
            update_by: mapping.update_by.clone(),
            limit: mapping.row_limit(),
        })
    }

    /// Query projecting exactly the converted columns.
    pub fn source_query(&self, keys: &[&str]) -> String {
        let columns: Vec<String> = keys.iter().map(|k| quote_ident(k)).collect();
        let mut sql = format!(
            "SELECT {} FROM {} WHERE ({})",
            columns.join(","),
            self.source_table,
            self.where_clause
        );
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        sql
    }

    /// Query counting the rows the source query will return (ignoring `limit`).
    pub fn count_query(&self) -> String {
        format!(
            "SELECT COUNT(*) FROM {} WHERE ({})",
            self.source_table, self.where_clause
        )
    }
}

/// Outcome of a transfer run.
#[derive(Debug, Clone, Serialize)]
pub struct TransferStats {
    /// Unique id of this run, for correlating logs.
    pub run_id: Uuid,
    /// Rows fetched from the source.
    pub rows_read: u64,
    /// Statements executed.
    pub rows_written: u64,
    /// Rows that produced no statement.
    pub rows_skipped: u64,
    /// Committed batches.
    pub batches: u64,
    pub duration_seconds: f64,
    pub rows_per_second: f64,
}

impl TransferStats {
    fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            rows_read: 0,
            rows_written: 0,
            rows_skipped: 0,
            batches: 0,
            duration_seconds: 0.0,
            rows_per_second: 0.0,
        }
    }
}

/// Drives one migration from a streaming reader into a writer session.
pub struct TransferEngine {
    config: TransferConfig,
    progress_tx: Option<mpsc::Sender<ProgressUpdate>>,
}

impl TransferEngine {
    /// Create a new transfer engine.
    pub fn new(config: TransferConfig) -> Self {
        Self {
            config,
            progress_tx: None,
        }
    }

    /// Set progress channel for updates.
    pub fn with_progress(mut self, tx: mpsc::Sender<ProgressUpdate>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    async fn send_progress(&self, processed: u64, total: u64) {
        if let Some(tx) = &self.progress_tx {
            let _ = tx
                .send(ProgressUpdate {
                    phase: Phase::Transfer,
                    processed,
                    total,
                })
                .await;
        }
    }

    /// Run the migration.
    ///
    /// Lookups made during conversion go through `target`, inside the
    /// batch's transaction.
    ///
    /// # Errors
    ///
    /// Query and lookup failures propagate unchanged; a failing statement
    /// becomes `MigrateError::Transfer` naming the row. Batches committed
    /// before the failure stay committed.
    pub async fn execute<S, T>(
        &self,
        job: &TransferJob,
        convertor: &Convertor,
        source: &mut S,
        target: &mut T,
    ) -> Result<TransferStats>
    where
        S: SourceReader + ?Sized,
        T: TargetSession + ?Sized,
    {
        let start = Instant::now();
        let mut stats = TransferStats::new(Uuid::new_v4());
        let batch_size = self.config.batch_size.max(1);

        let total = match job.limit {
            Some(limit) => limit,
            None => count_rows(target, job).await?,
        };

        info!(
            run_id = %stats.run_id,
            "Starting transfer {} -> {} ({} rows expected, batch size {})",
            job.source_table, job.target_table, total, batch_size
        );

        let sql = job.source_query(&convertor.keys());
        debug!("Source query: {}", sql);
        let mut cursor = source.open_stream(&sql).await?;

        loop {
            let wanted = match job.limit {
                Some(limit) => batch_size.min(usize::try_from(limit - stats.rows_read).unwrap_or(batch_size)),
                None => batch_size,
            };
            if wanted == 0 {
                break;
            }

            let rows = cursor.next_batch(wanted).await?;
            if rows.is_empty() {
                break;
            }

            target.begin().await?;
            let written = match write_batch(job, convertor, &rows, stats.rows_read, &mut *target).await {
                Ok(written) => written,
                Err(e) => {
                    if let Err(rollback) = target.rollback().await {
                        warn!("Rollback of failed batch {} failed: {}", stats.batches + 1, rollback);
                    }
                    return Err(e);
                }
            };
            target.commit().await?;

            stats.rows_written += written;
            stats.rows_skipped += rows.len() as u64 - written;

            stats.rows_read += rows.len() as u64;
            stats.batches += 1;
            debug!(
                "Batch {}: {} rows committed ({}/{})",
                stats.batches,
                rows.len(),
                stats.rows_read,
                total
            );
            self.send_progress(stats.rows_read, total).await;

            if rows.len() < wanted {
                break;
            }
        }

        let elapsed = start.elapsed().as_secs_f64();
        stats.duration_seconds = elapsed;
        stats.rows_per_second = if elapsed > 0.0 {
            stats.rows_read as f64 / elapsed
        } else {
            0.0
        };

        info!(
            run_id = %stats.run_id,
            "Transfer complete: {} read, {} written, {} skipped in {:.2}s",
            stats.rows_read, stats.rows_written, stats.rows_skipped, elapsed
        );

        Ok(stats)
    }
}

/// Convert and write one batch inside the caller's transaction.
///
/// Returns the number of statements executed; the rest of the rows were
/// skipped.
async fn write_batch<T>(
    job: &TransferJob,
    convertor: &Convertor,
    rows: &[Record],
    offset: u64,
    target: &mut T,
) -> Result<u64>
where
    T: TargetSession + ?Sized,
{
    let mut written = 0;
    for (i, row) in rows.iter().enumerate() {
        let row_number = offset + i as u64 + 1;
        let converted = convertor.process(row, &mut *target).await?;
        let Some(stmt) = build_statement(&job.target_table, converted, job.update_by.as_deref())
        else {
            debug!("Row {}: nothing to write, skipped", row_number);
            continue;
        };
        target.execute(&stmt).await.map_err(|e| {
            MigrateError::transfer(job.target_table.clone(), format!("row {}: {}", row_number, e))
        })?;
        written += 1;
    }
    Ok(written)
}

async fn count_rows<T>(target: &mut T, job: &TransferJob) -> Result<u64>
where
    T: TargetSession + ?Sized,
{
    let row = target.query_first(&job.count_query()).await?;
    let count = row
        .and_then(|r| r.values().next().and_then(|v| v.as_i64()))
        .unwrap_or(0);
    Ok(u64::try_from(count).unwrap_or(0))
}
