//! Migration orchestrator - owns the connections and runs one job.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::Config;
use crate::convert::{Convertor, FunctionRegistry};
use crate::drivers::{MysqlReader, MysqlSession};
use crate::error::Result;
use crate::progress::ProgressUpdate;
use crate::transfer::{TransferConfig, TransferEngine, TransferJob, TransferStats};
use crate::verify::{VerifyEngine, VerifyJob, VerifyReport};

/// Migration orchestrator.
///
/// Holds exactly two connections: the writer session, which runs every
/// write, lookup and verifier query, and the reader that streams source rows.
pub struct Orchestrator {
    config: Config,
    session: MysqlSession,
    reader: MysqlReader,
    functions: FunctionRegistry,
    transfer: TransferConfig,
    progress_tx: Option<mpsc::Sender<ProgressUpdate>>,
}

/// Result of pinging both connections.
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckResult {
    pub writer_connected: bool,
    pub writer_latency_ms: u64,
    pub writer_error: Option<String>,
    pub reader_connected: bool,
    pub reader_latency_ms: u64,
    pub reader_error: Option<String>,
    pub healthy: bool,
}

impl Orchestrator {
    /// Open the writer session and the streaming reader.
    pub async fn connect(config: Config) -> Result<Self> {
        let (source_db, target_db) = config.databases()?;
        info!(
            "Connecting for {}.{} -> {}.{}",
            source_db, config.mapping.from, target_db, config.mapping.to
        );

        let session = MysqlSession::connect(&config.connection).await?;
        let reader = MysqlReader::connect(&config.connection).await?;

        Ok(Self {
            config,
            session,
            reader,
            functions: FunctionRegistry::new(),
            transfer: TransferConfig::default(),
            progress_tx: None,
        })
    }

    /// Set progress channel for updates.
    pub fn with_progress(mut self, tx: mpsc::Sender<ProgressUpdate>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    /// Use a registry with extra named functions.
    pub fn with_functions(mut self, functions: FunctionRegistry) -> Self {
        self.functions = functions;
        self
    }

    /// Override the configured row limit; 0 means unbounded.
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.config.mapping.limit = limit;
        self
    }

    /// Override the number of rows per batch.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.transfer.batch_size = batch_size;
        self
    }

    /// Run the migration with foreign-key checks disabled on the writer.
    pub async fn run_migration(&mut self) -> Result<TransferStats> {
        let (source_db, target_db) = self.config.databases()?;
        let job = TransferJob::new(&self.config.mapping, source_db, target_db)?;
        let convertor = Convertor::from_spec(&self.config.mapping, &self.functions)?;

        let mut engine = TransferEngine::new(self.transfer.clone());
        if let Some(tx) = &self.progress_tx {
            engine = engine.with_progress(tx.clone());
        }

        self.session.set_foreign_key_checks(false).await?;
        let result = engine
            .execute(&job, &convertor, &mut self.reader, &mut self.session)
            .await;
        let restored = self.session.set_foreign_key_checks(true).await;

        let stats = result?;
        restored?;
        Ok(stats)
    }

    /// Sample `samples` destination rows and report how many still match.
    pub async fn run_verify(&mut self, samples: u64) -> Result<VerifyReport> {
        let (source_db, target_db) = self.config.databases()?;
        let job = VerifyJob::new(&self.config.mapping, source_db, target_db)?;
        let convertor = Convertor::from_spec(&self.config.mapping, &self.functions)?;

        let mut engine = VerifyEngine::new();
        if let Some(tx) = &self.progress_tx {
            engine = engine.with_progress(tx.clone());
        }

        self.session.set_foreign_key_checks(false).await?;
        let result = engine
            .execute(&job, &convertor, samples, &mut self.session)
            .await;
        let restored = self.session.set_foreign_key_checks(true).await;

        let report = result?;
        restored?;
        Ok(report)
    }

    /// Round-trip `SELECT 1` on both connections.
    pub async fn health_check(&mut self) -> Result<HealthCheckResult> {
        let (writer_connected, writer_latency_ms, writer_error) =
            ping_outcome("writer", self.session.ping().await);
        let (reader_connected, reader_latency_ms, reader_error) =
            ping_outcome("reader", self.reader.ping().await);

        Ok(HealthCheckResult {
            writer_connected,
            writer_latency_ms,
            writer_error,
            reader_connected,
            reader_latency_ms,
            reader_error,
            healthy: writer_connected && reader_connected,
        })
    }

    /// Disconnect both handles.
    pub async fn close(self) -> Result<()> {
        let writer = self.session.close().await;
        let reader = self.reader.close().await;
        writer?;
        reader
    }
}

fn ping_outcome(role: &str, result: Result<Duration>) -> (bool, u64, Option<String>) {
    match result {
        Ok(latency) => (
            true,
            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
            None,
        ),
        Err(e) => {
            warn!("{} ping failed: {}", role, e);
            (false, 0, Some(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MigrateError;

    #[test]
    fn test_ping_outcome() {
        let ok = ping_outcome("writer", Ok(Duration::from_millis(12)));
        assert_eq!(ok, (true, 12, None));

        let failed = ping_outcome("reader", Err(MigrateError::Config("down".into())));
        assert!(!failed.0);
        assert!(failed.2.unwrap().contains("down"));
    }

    #[tokio::test]
    async fn test_connect_requires_databases() {
        let config = Config::from_yaml("from: a\nto: b\nmap: { id: id }\n").unwrap();
        let err = Orchestrator::connect(config).await.err().unwrap();
        assert!(matches!(err, MigrateError::Config(_)));
        assert!(err.to_string().contains("source database"));
    }
}
