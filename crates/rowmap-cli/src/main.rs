//! rowmap CLI - declarative MySQL table migration with sampled verification.

use clap::{Parser, Subcommand};
use rowmap::{
    Config, ConnectionOverrides, Convertor, FunctionRegistry, MigrateError, Orchestrator,
    ProgressUpdate, TransferJob,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::mpsc;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(name = "rowmap")]
#[command(about = "Declarative MySQL table migration with sampled verification")]
#[command(version)]
struct Cli {
    /// Path to YAML mapping file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// MySQL host (overrides connection.host)
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// MySQL port (overrides connection.port)
    #[arg(short = 'P', long)]
    port: Option<u16>,

    /// MySQL user (overrides connection.user)
    #[arg(short, long)]
    user: Option<String>,

    /// MySQL password (overrides connection.password)
    #[arg(short, long)]
    password: Option<String>,

    /// Source database (overrides connection.source_database)
    #[arg(short, long = "src")]
    src: Option<String>,

    /// Destination database (overrides connection.target_database)
    #[arg(short, long = "dst")]
    dst: Option<String>,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Print progress updates as JSON lines to stderr
    #[arg(long)]
    progress: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate rows from the source table into the destination table
    Run {
        /// Override the mapping's row limit (0 = unbounded)
        #[arg(long)]
        limit: Option<i64>,

        /// Rows fetched and committed per transaction
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Sample destination rows and check them against their source rows
    #[command(alias = "check")]
    Verify {
        /// Number of rows to sample
        #[arg(short = 'n', long, default_value = "100")]
        samples: u64,
    },

    /// Validate the mapping without connecting and print the source query
    Validate,

    /// Test both database connections
    HealthCheck,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let overrides = ConnectionOverrides {
        host: cli.host,
        port: cli.port,
        user: cli.user,
        password: cli.password,
        source_database: cli.src,
        target_database: cli.dst,
    };
    let config = Config::load(&cli.config)?.with_overrides(overrides);
    config.validate()?;
    info!("Loaded configuration from {:?}", cli.config);

    if let Commands::Validate = cli.command {
        let (source_db, target_db) = config.databases()?;
        let convertor = Convertor::from_spec(&config.mapping, &FunctionRegistry::new())?;
        let job = TransferJob::new(&config.mapping, source_db, target_db)?;
        let query = job.source_query(&convertor.keys());

        if cli.output_json {
            let out = serde_json::json!({
                "valid": true,
                "source_table": job.source_table,
                "target_table": job.target_table,
                "source_query": query,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        } else {
            println!("Configuration is valid");
            println!("  {} -> {}", job.source_table, job.target_table);
            println!("  Source query: {}", query);
        }
        return Ok(());
    }

    let mut orchestrator = Orchestrator::connect(config).await?;
    if let Commands::Run { limit, batch_size } = &cli.command {
        if let Some(limit) = *limit {
            orchestrator = orchestrator.with_limit(limit);
        }
        if let Some(size) = *batch_size {
            orchestrator = orchestrator.with_batch_size(size);
        }
    }

    let printer = if cli.progress {
        let (tx, rx) = mpsc::channel(100);
        orchestrator = orchestrator.with_progress(tx);
        Some(tokio::spawn(print_progress(rx)))
    } else {
        None
    };

    let outcome = execute(&mut orchestrator, cli.command, cli.output_json).await;

    // Closing drops the orchestrator's sender, which ends the printer.
    let closed = orchestrator.close().await;
    if let Some(handle) = printer {
        let _ = handle.await;
    }

    outcome?;
    closed
}

async fn execute(
    orchestrator: &mut Orchestrator,
    command: Commands,
    output_json: bool,
) -> Result<(), MigrateError> {
    match command {
        Commands::Validate => Ok(()),

        Commands::Run { .. } => {
            let stats = orchestrator.run_migration().await?;

            if output_json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("\nMigration completed!");
                println!("  Run ID: {}", stats.run_id);
                println!("  Duration: {:.2}s", stats.duration_seconds);
                println!("  Rows read: {}", stats.rows_read);
                println!("  Rows written: {}", stats.rows_written);
                if stats.rows_skipped > 0 {
                    println!("  Rows skipped: {}", stats.rows_skipped);
                }
                println!("  Batches: {}", stats.batches);
                println!("  Throughput: {:.0} rows/sec", stats.rows_per_second);
            }
            Ok(())
        }

        Commands::Verify { samples } => {
            let report = orchestrator.run_verify(samples).await?;

            if output_json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report);
            }
            Ok(())
        }

        Commands::HealthCheck => {
            let result = orchestrator.health_check().await?;

            if output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Writer: {} ({}ms)",
                    if result.writer_connected { "OK" } else { "FAILED" },
                    result.writer_latency_ms
                );
                if let Some(ref err) = result.writer_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "  Reader: {} ({}ms)",
                    if result.reader_connected { "OK" } else { "FAILED" },
                    result.reader_latency_ms
                );
                if let Some(ref err) = result.reader_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !result.healthy {
                return Err(MigrateError::connection(
                    "Health check failed",
                    "pinging writer and reader connections",
                ));
            }
            Ok(())
        }
    }
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Print each progress update as one JSON line on stderr.
async fn print_progress(mut rx: mpsc::Receiver<ProgressUpdate>) {
    while let Some(update) = rx.recv().await {
        if let Ok(line) = serde_json::to_string(&update) {
            eprintln!("{}", line);
        }
    }
}
