//! Configuration type definitions.

use std::fmt;

use indexmap::IndexMap;
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;

use crate::core::Value;

/// Root configuration structure.
///
/// The mapping specification sits at the top level of the file; the
/// connection section is optional and can be supplied from the command line.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Database connection settings.
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// What to migrate and how.
    #[serde(flatten)]
    pub mapping: MappingSpec,
}

/// MySQL connection settings shared by the reader and writer handles.
#[derive(Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Database host.
    #[serde(default = "default_host")]
    pub host: String,

    /// Database port (default: 3306).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Username.
    #[serde(default)]
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// TLS mode: disable, prefer, require, verify-ca, verify-full (default: disable).
    #[serde(default = "default_ssl_mode")]
    pub ssl_mode: String,

    /// Database holding the source table.
    #[serde(default)]
    pub source_database: Option<String>,

    /// Database holding the destination table.
    #[serde(default)]
    pub target_database: Option<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            user: String::new(),
            password: String::new(),
            ssl_mode: default_ssl_mode(),
            source_database: None,
            target_database: None,
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("ssl_mode", &self.ssl_mode)
            .field("source_database", &self.source_database)
            .field("target_database", &self.target_database)
            .finish()
    }
}

/// Declarative description of one table-to-table migration.
#[derive(Debug, Clone, Deserialize)]
pub struct MappingSpec {
    /// Source table name.
    pub from: String,

    /// Destination table name.
    pub to: String,

    /// Source key expression -> destination spec.
    #[serde(default)]
    pub map: IndexMap<String, DestSpec>,

    /// Destination field -> literal merged into every output record.
    #[serde(default, rename = "const")]
    pub constants: IndexMap<String, serde_json::Value>,

    /// Predicate restricting source rows (default: "1").
    #[serde(default = "default_predicate", rename = "where")]
    pub where_clause: String,

    /// Destination field whose value keys an UPDATE instead of an INSERT.
    #[serde(default)]
    pub update_by: Option<String>,

    /// Maximum rows to process; 0 or negative means unbounded.
    #[serde(default)]
    pub limit: i64,

    /// Verifier join: destination column -> source column it must equal.
    #[serde(default)]
    pub check: Option<IndexMap<String, String>>,

    /// Predicate restricting sampled destination rows (default: "1").
    #[serde(default = "default_predicate")]
    pub check_where: String,

    /// Apply `where` when fetching source rows during verification.
    #[serde(default)]
    pub check_src_use_where: bool,
}

impl MappingSpec {
    /// Effective row cap, `None` when unbounded.
    pub fn row_limit(&self) -> Option<u64> {
        u64::try_from(self.limit).ok().filter(|&n| n > 0)
    }
}

/// Destination side of one `map` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DestSpec {
    /// Destination key expression; the source value is decoded by its type suffix.
    Key(String),

    /// Fan-out to several destinations.
    ///
    /// Tried before `Object`: a derived struct also accepts the sequence
    /// form `[dst, map, py]`, which would swallow short lists.
    FanOut(Vec<FanOutSpec>),

    /// Single destination with a value table or a custom function.
    Object(DestObject),
}

/// Object form of a destination spec.
#[derive(Debug, Clone, Deserialize)]
pub struct DestObject {
    /// Destination field.
    pub dst: String,

    /// Value-substitution table (takes precedence over `py`).
    #[serde(default)]
    pub map: Option<ValueTable>,

    /// Name of a registered custom function.
    #[serde(default)]
    pub py: Option<String>,
}

/// One element of a fan-out list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FanOutSpec {
    /// Broadcast the originating value to another destination key expression.
    Key(String),

    /// Pull a different field, optionally substituted, into `dst`.
    Pull {
        src: String,
        dst: String,
        #[serde(default)]
        map: Option<ValueTable>,
    },
}

/// Key of a value-substitution table: canonical text, or null.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TableKey {
    Null,
    Text(String),
}

impl TableKey {
    /// Key under which a source value is looked up.
    pub fn of(value: &Value) -> Self {
        match value.as_text() {
            Some(text) => TableKey::Text(text.into_owned()),
            None => TableKey::Null,
        }
    }
}

impl<'de> Deserialize<'de> for TableKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct KeyVisitor;

        impl<'de> Visitor<'de> for KeyVisitor {
            type Value = TableKey;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a scalar value-table key")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<TableKey, E> {
                Ok(TableKey::Text(v.to_string()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<TableKey, E> {
                Ok(TableKey::Text(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<TableKey, E> {
                Ok(TableKey::of(&Value::Int(v)))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<TableKey, E> {
                Ok(TableKey::Text(v.to_string()))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<TableKey, E> {
                Ok(TableKey::of(&Value::Float(v)))
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<TableKey, E> {
                Ok(TableKey::of(&Value::Bool(v)))
            }

            fn visit_unit<E: de::Error>(self) -> Result<TableKey, E> {
                Ok(TableKey::Null)
            }

            fn visit_none<E: de::Error>(self) -> Result<TableKey, E> {
                Ok(TableKey::Null)
            }
        }

        deserializer.deserialize_any(KeyVisitor)
    }
}

/// Value-substitution table: explicit old -> new values plus a `def` fallback.
///
/// A table without `def` still parses so that validation can name the
/// offending field; [`validate`](super::Config::validate) rejects it.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueTable {
    entries: IndexMap<TableKey, serde_json::Value>,
    default: Option<serde_json::Value>,
}

/// Reserved key holding a table's fallback value.
pub const VALUE_TABLE_DEFAULT_KEY: &str = "def";

impl ValueTable {
    /// Build a table from entries and a fallback.
    pub fn new(
        entries: impl IntoIterator<Item = (TableKey, serde_json::Value)>,
        default: serde_json::Value,
    ) -> Self {
        Self {
            entries: entries.into_iter().collect(),
            default: Some(default),
        }
    }

    /// The `def` fallback, if declared.
    pub fn default_value(&self) -> Option<&serde_json::Value> {
        self.default.as_ref()
    }

    /// Substitute a source value, falling back to the table's default.
    ///
    /// Lookup is by canonical text, independent of the source value's type.
    pub fn substitute(&self, value: &Value) -> Value {
        self.entries
            .get(&TableKey::of(value))
            .or(self.default.as_ref())
            .map_or(Value::Null, |replacement| Value::from(replacement.clone()))
    }

    /// Number of explicit entries (excluding the default).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table has no explicit entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'de> Deserialize<'de> for ValueTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = ValueTable;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a value table mapping")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<ValueTable, A::Error> {
                let mut entries = IndexMap::new();
                let mut default = None;

                while let Some((key, value)) =
                    map.next_entry::<TableKey, serde_json::Value>()?
                {
                    match key {
                        TableKey::Text(ref k) if k == VALUE_TABLE_DEFAULT_KEY => {
                            default = Some(value)
                        }
                        key => {
                            entries.insert(key, value);
                        }
                    }
                }

                Ok(ValueTable { entries, default })
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

// Default value functions for serde
fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3306
}

fn default_ssl_mode() -> String {
    "disable".to_string()
}

fn default_predicate() -> String {
    "1".to_string()
}
