//! Dynamic value types for schema-less row conversion.
//!
//! Rows move through the conversion engine as [`Record`]s: ordered maps from
//! column name to [`Value`]. Source and destination records share the same
//! representation but are shaped independently by the mapping.

use std::borrow::Cow;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use indexmap::IndexMap;

/// One database row, keyed by column name in column order.
pub type Record = IndexMap<String, Value>;

/// A single cell value.
///
/// Character data is always held as `Text` (UTF-8); the driver decodes it
/// once when the row is fetched, so no code past the driver needs to care
/// about encodings.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL or an absent value.
    Null,

    /// Boolean, only produced by config literals and JSON.
    Bool(bool),

    /// Signed integer.
    Int(i64),

    /// Unsigned integer that does not fit in `i64`.
    UInt(u64),

    /// Floating point.
    Float(f64),

    /// Text data.
    Text(String),

    /// Binary data (binary charset columns).
    Bytes(Vec<u8>),

    /// Timestamp without timezone.
    DateTime(NaiveDateTime),

    /// Date without time component.
    Date(NaiveDate),

    /// Structured value produced by the `json` decoder or a config literal.
    Json(serde_json::Value),

    /// A whole row, produced by a database lookup.
    Record(Record),
}

impl Value {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Canonical text form of the value, `None` for NULL.
    ///
    /// This is the one normalization used wherever values of different
    /// origins are compared: value-table lookups and verification.
    #[must_use]
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Value::Null => None,
            Value::Bool(v) => Some(Cow::Borrowed(if *v { "1" } else { "0" })),
            Value::Int(v) => Some(Cow::Owned(v.to_string())),
            Value::UInt(v) => Some(Cow::Owned(v.to_string())),
            Value::Float(v) => Some(Cow::Owned(format!("{:?}", v))),
            Value::Text(v) => Some(Cow::Borrowed(v.as_str())),
            Value::Bytes(v) => Some(String::from_utf8_lossy(v)),
            Value::DateTime(v) => Some(Cow::Owned(format_datetime(v))),
            Value::Date(v) => Some(Cow::Owned(v.format("%Y-%m-%d").to_string())),
            Value::Json(v) => Some(Cow::Owned(v.to_string())),
            Value::Record(_) => Some(Cow::Owned(self.to_json().to_string())),
        }
    }

    /// Interpret the value as an integer, if it has an integral form.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::UInt(v) => i64::try_from(*v).ok(),
            Value::Bool(v) => Some(i64::from(*v)),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Bytes(b) => std::str::from_utf8(b).ok()?.trim().parse().ok(),
            _ => None,
        }
    }

    /// Convert to a JSON value (used to bind structured values as text).
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as J;
        match self {
            Value::Null => J::Null,
            Value::Bool(v) => J::Bool(*v),
            Value::Int(v) => J::from(*v),
            Value::UInt(v) => J::from(*v),
            Value::Float(v) => serde_json::Number::from_f64(*v).map_or(J::Null, J::Number),
            Value::Json(v) => v.clone(),
            Value::Record(r) => J::Object(
                r.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            other => other.as_text().map_or(J::Null, |s| J::String(s.into_owned())),
        }
    }

    /// Look up a field when the value is a record or a JSON object.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<Value> {
        match self {
            Value::Record(r) => r.get(name).cloned(),
            Value::Json(serde_json::Value::Object(m)) => m.get(name).cloned().map(Value::from),
            _ => None,
        }
    }
}

/// Format a timestamp the way it is stored and compared:
/// `YYYY-MM-DD HH:MM:SS`, with microseconds only when non-zero.
pub fn format_datetime(dt: &NaiveDateTime) -> String {
    if dt.nanosecond() / 1_000 == 0 {
        dt.format("%Y-%m-%d %H:%M:%S").to_string()
    } else {
        dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_text() {
            Some(text) => f.write_str(&text),
            None => f.write_str("NULL"),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value as J;
        match v {
            J::Null => Value::Null,
            J::Bool(b) => Value::Bool(b),
            J::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Value::UInt(u)
                } else {
                    n.as_f64().map_or(Value::Null, Value::Float)
                }
            }
            J::String(s) => Value::Text(s),
            structured => Value::Json(structured),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Value::Record(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
