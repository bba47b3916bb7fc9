//! Key expression parsing.
//!
//! A key expression names a field and how its value is resolved:
//!
//! | expression | field | resolver |
//! |------------|-------|----------|
//! | `name` | `name` | identity |
//! | `name+int` | `name` | decoder registered under `int` |
//! | `name+db+table+id` | `name` | row lookup in `table` by `id` |
//!
//! Parsing never fails; anything else is taken as a literal field name.

use crate::core::{Record, RowLookup, Value};
use crate::error::Result;

use super::decode::Decoder;

/// Separator between key expression segments.
const SEGMENT_SEPARATOR: char = '+';

/// Marker segment for the lookup form.
const LOOKUP_MARKER: &str = "db";

/// How a field's value is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolver {
    /// Pass the value through unchanged.
    Raw,
    /// Decode with a registered decoder.
    Decode(Decoder),
    /// Replace the value with the row of `table` whose `id_column` equals it.
    Lookup { table: String, id_column: String },
}

impl Resolver {
    /// Resolve a value, running a lookup through `lookup` when required.
    ///
    /// Lookups are issued on every call; nothing is cached.
    pub async fn resolve<L>(&self, value: Value, lookup: &mut L) -> Result<Value>
    where
        L: RowLookup + ?Sized,
    {
        match self {
            Resolver::Raw => Ok(value),
            Resolver::Decode(decoder) => Ok(decoder.decode(value)),
            Resolver::Lookup { .. } if value.is_null() => Ok(Value::Record(Record::new())),
            Resolver::Lookup { table, id_column } => lookup
                .lookup_row(table, id_column, &value)
                .await
                .map(Value::Record),
        }
    }
}

/// A parsed key expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPath {
    /// Field name.
    pub field: String,
    /// Value resolver.
    pub resolver: Resolver,
}

/// Parse a key expression.
pub fn parse_key(expr: &str) -> KeyPath {
    let segments: Vec<&str> = expr.split(SEGMENT_SEPARATOR).collect();

    match segments.as_slice() {
        [field, tag] => KeyPath {
            field: (*field).to_string(),
            resolver: Resolver::Decode(Decoder::from_tag(tag)),
        },
        [field, marker, table, id_column, ..] if *marker == LOOKUP_MARKER => KeyPath {
            field: (*field).to_string(),
            resolver: Resolver::Lookup {
                table: (*table).to_string(),
                id_column: (*id_column).to_string(),
            },
        },
        _ => KeyPath {
            field: expr.to_string(),
            resolver: Resolver::Raw,
        },
    }
}
