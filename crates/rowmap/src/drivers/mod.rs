//! Database driver implementations.
//!
//! - [`mysql`]: MySQL/MariaDB driver implementing the
//!   [`TargetSession`](crate::core::TargetSession) and
//!   [`SourceReader`](crate::core::SourceReader) seams

pub mod mysql;

pub use mysql::{MysqlReader, MysqlSession, SslMode};
