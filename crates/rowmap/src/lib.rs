//! # rowmap
//!
//! Declarative table-to-table row migration for MySQL.
//!
//! A YAML mapping describes how each source field becomes zero or more
//! destination fields:
//!
//! - **Decoders** on source and destination keys (`field+int`, `field+date`)
//! - **Row lookups** that replace a field with a row from another table
//!   (`field+db+table+id`)
//! - **Value tables**, named functions and fan-out to several columns
//! - **Batched writes**, one transaction per fetched batch, as INSERT or
//!   keyed UPDATE
//! - **Sampled verification** that re-runs the conversion on random
//!   destination rows and reports the match rate
//!
//! ## Example
//!
//! ```rust,no_run
//! use rowmap::{Config, Orchestrator};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> rowmap::Result<()> {
//!     let config = Config::load("mapping.yaml")?;
//!     let mut orchestrator = Orchestrator::connect(config).await?;
//!     let stats = orchestrator.run_migration().await?;
//!     println!("Migrated {} rows", stats.rows_written);
//!     orchestrator.close().await
//! }
//! ```

pub mod config;
pub mod convert;
pub mod core;
pub mod drivers;
pub mod error;
pub mod orchestrator;
pub mod progress;
pub mod transfer;
pub mod verify;

#[cfg(test)]
mod testing;

// Re-exports for convenient access
pub use config::{Config, ConnectionOverrides, MappingSpec};
pub use convert::{Convertor, FunctionRegistry};
pub use core::{Record, Value};
pub use error::{MigrateError, Result};
pub use orchestrator::{HealthCheckResult, Orchestrator};
pub use progress::{Phase, ProgressUpdate};
pub use transfer::{TransferConfig, TransferEngine, TransferJob, TransferStats};
pub use verify::{VerifyEngine, VerifyJob, VerifyReport};
