//! Core abstractions shared by the engine and the drivers.
//!
//! - [`value`]: dynamic cell values and ordered records
//! - [`traits`]: database seams (lookup, streaming reads, writer session)
//! - [`identifier`]: identifier and literal quoting for generated SQL

pub mod identifier;
pub mod traits;
pub mod value;

pub use traits::{RowLookup, RowSource, SourceReader, Statement, TargetSession};
pub use value::{format_datetime, Record, Value};
