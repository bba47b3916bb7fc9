//! Conversion between `mysql_async` values and [`Value`].
//!
//! Every fetched cell is normalized here, once: character data becomes
//! UTF-8 `Text`, binary-charset data stays `Bytes`, and text-protocol
//! numbers and temporals are parsed by column type.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use mysql_async::consts::ColumnType;
use mysql_async::{Column, Row, Value as MyValue};

use crate::core::{Record, Value};

/// Collation id of the `binary` character set.
const BINARY_CHARSET: u16 = 63;

/// Convert a fetched row to a record keyed by column name.
pub fn row_to_record(mut row: Row) -> Record {
    let columns = row.columns();
    let mut record = Record::with_capacity(columns.len());
    for (i, column) in columns.iter().enumerate() {
        let raw: MyValue = row.take(i).unwrap_or(MyValue::NULL);
        record.insert(column.name_str().into_owned(), from_mysql(raw, column));
    }
    record
}

/// Convert one cell.
pub fn from_mysql(value: MyValue, column: &Column) -> Value {
    match value {
        MyValue::NULL => Value::Null,
        MyValue::Int(i) => Value::Int(i),
        MyValue::UInt(u) => i64::try_from(u).map_or(Value::UInt(u), Value::Int),
        MyValue::Float(f) => Value::Float(f64::from(f)),
        MyValue::Double(d) => Value::Float(d),
        MyValue::Date(year, month, day, hour, minute, second, micros) => {
            let date = NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day));
            match date {
                Some(date) if is_date_only(column.column_type()) => Value::Date(date),
                Some(date) => date
                    .and_hms_micro_opt(
                        u32::from(hour),
                        u32::from(minute),
                        u32::from(second),
                        micros,
                    )
                    .map_or(Value::Null, Value::DateTime),
                // Zero dates are kept as text.
                None => Value::Text(format!(
                    "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                    year, month, day, hour, minute, second
                )),
            }
        }
        MyValue::Time(negative, days, hours, minutes, seconds, micros) => {
            let hours = days * 24 + u32::from(hours);
            let sign = if negative { "-" } else { "" };
            let mut text = format!("{}{:02}:{:02}:{:02}", sign, hours, minutes, seconds);
            if micros != 0 {
                text.push_str(&format!(".{:06}", micros));
            }
            Value::Text(text)
        }
        MyValue::Bytes(bytes) => from_bytes(bytes, column),
    }
}

fn is_date_only(column_type: ColumnType) -> bool {
    matches!(
        column_type,
        ColumnType::MYSQL_TYPE_DATE | ColumnType::MYSQL_TYPE_NEWDATE
    )
}

/// Text-protocol cells (and binary-protocol strings) arrive as bytes.
fn from_bytes(bytes: Vec<u8>, column: &Column) -> Value {
    use ColumnType::*;

    let column_type = column.column_type();
    if column.character_set() == BINARY_CHARSET
        && matches!(
            column_type,
            MYSQL_TYPE_STRING
                | MYSQL_TYPE_VAR_STRING
                | MYSQL_TYPE_VARCHAR
                | MYSQL_TYPE_BLOB
                | MYSQL_TYPE_TINY_BLOB
                | MYSQL_TYPE_MEDIUM_BLOB
                | MYSQL_TYPE_LONG_BLOB
                | MYSQL_TYPE_BIT
                | MYSQL_TYPE_GEOMETRY
        )
    {
        return Value::Bytes(bytes);
    }

    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => return Value::Bytes(e.into_bytes()),
    };

    match column_type {
        MYSQL_TYPE_TINY | MYSQL_TYPE_SHORT | MYSQL_TYPE_LONG | MYSQL_TYPE_INT24
        | MYSQL_TYPE_LONGLONG | MYSQL_TYPE_YEAR => {
            if let Ok(i) = text.parse::<i64>() {
                Value::Int(i)
            } else if let Ok(u) = text.parse::<u64>() {
                Value::UInt(u)
            } else {
                Value::Text(text)
            }
        }
        MYSQL_TYPE_FLOAT | MYSQL_TYPE_DOUBLE => text
            .parse::<f64>()
            .map_or_else(|_| Value::Text(text.clone()), Value::Float),
        MYSQL_TYPE_DATE | MYSQL_TYPE_NEWDATE => NaiveDate::parse_from_str(&text, "%Y-%m-%d")
            .map_or_else(|_| Value::Text(text.clone()), Value::Date),
        MYSQL_TYPE_DATETIME | MYSQL_TYPE_DATETIME2 | MYSQL_TYPE_TIMESTAMP
        | MYSQL_TYPE_TIMESTAMP2 => NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S%.f")
            .map_or_else(|_| Value::Text(text.clone()), Value::DateTime),
        // DECIMAL keeps its exact text; everything else is character data.
        _ => Value::Text(text),
    }
}

/// Convert a value to a statement parameter.
pub fn to_mysql(value: &Value) -> MyValue {
    match value {
        Value::Null => MyValue::NULL,
        Value::Bool(b) => MyValue::Int(i64::from(*b)),
        Value::Int(i) => MyValue::Int(*i),
        Value::UInt(u) => MyValue::UInt(*u),
        Value::Float(f) => MyValue::Double(*f),
        Value::Text(s) => MyValue::Bytes(s.as_bytes().to_vec()),
        Value::Bytes(b) => MyValue::Bytes(b.clone()),
        Value::DateTime(dt) => MyValue::Date(
            u16::try_from(dt.year()).unwrap_or(0),
            dt.month() as u8,
            dt.day() as u8,
            dt.hour() as u8,
            dt.minute() as u8,
            dt.second() as u8,
            dt.nanosecond() / 1_000,
        ),
        Value::Date(d) => MyValue::Date(
            u16::try_from(d.year()).unwrap_or(0),
            d.month() as u8,
            d.day() as u8,
            0,
            0,
            0,
            0,
        ),
        Value::Json(_) | Value::Record(_) => {
            MyValue::Bytes(value.to_json().to_string().into_bytes())
        }
    }
}

/// Bind a value by its canonical text (string comparison semantics).
pub fn to_mysql_text(value: &Value) -> MyValue {
    value
        .as_text()
        .map_or(MyValue::NULL, |text| MyValue::Bytes(text.as_bytes().to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params() {
        assert_eq!(to_mysql(&Value::Null), MyValue::NULL);
        assert_eq!(to_mysql(&Value::Bool(true)), MyValue::Int(1));
        assert_eq!(to_mysql(&Value::from("a")), MyValue::Bytes(b"a".to_vec()));

        let dt = NaiveDate::from_ymd_opt(2023, 1, 15)
            .unwrap()
            .and_hms_micro_opt(8, 30, 5, 250)
            .unwrap();
        assert_eq!(
            to_mysql(&Value::DateTime(dt)),
            MyValue::Date(2023, 1, 15, 8, 30, 5, 250)
        );

        let json = Value::Json(serde_json::json!({"a": 1}));
        assert_eq!(to_mysql(&json), MyValue::Bytes(br#"{"a":1}"#.to_vec()));
    }

    #[test]
    fn test_text_params() {
        assert_eq!(to_mysql_text(&Value::Int(5)), MyValue::Bytes(b"5".to_vec()));
        assert_eq!(to_mysql_text(&Value::Null), MyValue::NULL);
    }
}
