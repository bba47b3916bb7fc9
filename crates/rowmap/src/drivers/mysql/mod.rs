//! MySQL/MariaDB database driver.
//!
//! This module provides MySQL implementations of the core seams:
//! - [`MysqlSession`]: the writer session (transactions, statements, lookups)
//! - [`MysqlReader`]: the read-only handle for unbuffered streaming
//!
//! Both are single connections without a default database; every generated
//! statement names its tables with their database.
//!
//! # Supported Versions
//!
//! - MySQL 5.7+, 8.0+
//! - MariaDB 10.2+

mod session;
mod stream;
mod tls;
pub mod value;

pub use session::MysqlSession;
pub use stream::MysqlReader;
pub use tls::SslMode;

use mysql_async::{Conn, Opts, OptsBuilder};
use tracing::info;

use crate::config::ConnectionConfig;
use crate::error::{MigrateError, Result};

/// Open one connection for the given role ("writer", "reader").
async fn connect(config: &ConnectionConfig, role: &str) -> Result<Conn> {
    let ssl_opts = SslMode::parse(&config.ssl_mode)?.ssl_opts();

    let mut builder = OptsBuilder::default()
        .ip_or_hostname(&config.host)
        .tcp_port(config.port)
        .user(Some(&config.user))
        .pass(Some(&config.password))
        // Use utf8mb4 for full Unicode support
        .init(vec!["SET NAMES utf8mb4"]);

    if let Some(ssl) = ssl_opts {
        builder = builder.ssl_opts(ssl);
    }

    let conn = Conn::new(Opts::from(builder)).await.map_err(|e| {
        MigrateError::connection(
            e,
            format!(
                "opening MySQL {} connection to {}:{}",
                role, config.host, config.port
            ),
        )
    })?;

    info!(
        "Connected to MySQL ({}): {}:{}",
        role, config.host, config.port
    );
    Ok(conn)
}
