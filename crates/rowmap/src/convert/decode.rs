//! Named scalar decoders selectable from a key expression's type suffix.
//!
//! A key expression `created+date` decodes the `created` value with the
//! decoder registered under `date`. The table is fixed; unknown tags resolve
//! to [`Decoder::Raw`], which passes values through unchanged.
//!
//! Decoders never fail. Unparseable input falls back to the decoder's
//! default: `Null`, or the current time for the `*n` date variants.

use chrono::{Local, NaiveDate, NaiveDateTime, TimeZone};
use tracing::debug;

use crate::core::{format_datetime, Value};

/// Output format for timestamps and the "now" defaults.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A scalar decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoder {
    /// Identity.
    Raw,
    /// Parse JSON text into a structured value.
    Json,
    /// Strict date parsing, `Null` when unparseable.
    Date,
    /// Lenient date normalization, `Null` when unusable.
    CustomDate,
    /// Strict date parsing, current time when unparseable.
    DateNow,
    /// Lenient date normalization, current time when unusable.
    CustomDateNow,
    /// Integer.
    Int,
    /// Canonical text.
    Str,
    /// Floating point.
    Float,
}

/// Tag -> decoder table.
const DECODERS: &[(&str, Decoder)] = &[
    ("json", Decoder::Json),
    ("date", Decoder::Date),
    ("cdate", Decoder::CustomDate),
    ("daten", Decoder::DateNow),
    ("cdaten", Decoder::CustomDateNow),
    ("int", Decoder::Int),
    ("str", Decoder::Str),
    ("float", Decoder::Float),
];

impl Decoder {
    /// Look up a decoder by tag; unknown tags resolve to [`Decoder::Raw`].
    pub fn from_tag(tag: &str) -> Self {
        DECODERS
            .iter()
            .find(|(name, _)| *name == tag)
            .map_or(Decoder::Raw, |(_, decoder)| *decoder)
    }

    /// Decode one value.
    pub fn decode(self, value: Value) -> Value {
        match self {
            Decoder::Raw => value,
            Decoder::Json => decode_json(value),
            Decoder::Int => decode_int(value),
            Decoder::Float => decode_float(value),
            Decoder::Str => match value.as_text() {
                Some(text) => Value::Text(text.into_owned()),
                None => Value::Null,
            },
            Decoder::Date => strict_date(&value).map_or(Value::Null, Value::Text),
            Decoder::DateNow => Value::Text(strict_date(&value).unwrap_or_else(now)),
            Decoder::CustomDate => lenient_date(&value).map_or(Value::Null, Value::Text),
            Decoder::CustomDateNow => Value::Text(lenient_date(&value).unwrap_or_else(now)),
        }
    }
}

fn now() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

fn decode_json(value: Value) -> Value {
    let text = match &value {
        Value::Text(s) => s.as_str(),
        Value::Bytes(b) => match std::str::from_utf8(b) {
            Ok(s) => s,
            Err(_) => return Value::Null,
        },
        _ => return value,
    };

    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(parsed) => Value::from(parsed),
        Err(e) => {
            debug!("json decode failed, using NULL: {}", e);
            Value::Null
        }
    }
}

fn decode_int(value: Value) -> Value {
    match value {
        Value::Int(_) | Value::UInt(_) | Value::Null => value,
        Value::Bool(b) => Value::Int(i64::from(b)),
        Value::Float(f) if f.is_finite() => Value::Int(f.trunc() as i64),
        other => other.as_i64().map_or(Value::Null, Value::Int),
    }
}

fn decode_float(value: Value) -> Value {
    match value {
        Value::Float(_) | Value::Null => value,
        Value::Int(i) => Value::Float(i as f64),
        Value::UInt(u) => Value::Float(u as f64),
        Value::Bool(b) => Value::Float(if b { 1.0 } else { 0.0 }),
        other => other
            .as_text()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .map_or(Value::Null, Value::Float),
    }
}

/// Date inputs shared by both date variants.
enum DateInput {
    Formatted(String),
    Text(String),
}

fn date_input(value: &Value) -> Option<DateInput> {
    let formatted = match value {
        Value::Int(secs) => timestamp(*secs as f64),
        Value::UInt(secs) => timestamp(*secs as f64),
        Value::Float(secs) => timestamp(*secs),
        Value::DateTime(dt) => Some(format_datetime(dt)),
        Value::Date(d) => d.and_hms_opt(0, 0, 0).as_ref().map(format_datetime),
        Value::Text(s) => return Some(DateInput::Text(s.clone())),
        Value::Bytes(b) => {
            return std::str::from_utf8(b)
                .ok()
                .map(|s| DateInput::Text(s.to_string()))
        }
        _ => None,
    };
    formatted.map(DateInput::Formatted)
}

/// Seconds since the epoch, rendered in the local time zone.
fn timestamp(secs: f64) -> Option<String> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9) as u32;
    Local
        .timestamp_opt(whole as i64, nanos)
        .single()
        .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
}

fn strict_date(value: &Value) -> Option<String> {
    let text = match date_input(value)? {
        DateInput::Formatted(s) => return Some(s),
        DateInput::Text(s) => s,
    };

    let len = text.chars().count();
    if len < 8 {
        return None;
    }

    let parsed = if len == 8 {
        parse_compact_date(&text)
    } else {
        let text = text.replace('/', "-");
        if len == 10 {
            NaiveDate::parse_from_str(&text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        } else if len > 19 {
            NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S%.f").ok()
        } else {
            NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S").ok()
        }
    };

    match parsed {
        Some(dt) => Some(format_datetime(&dt)),
        None => {
            debug!("unparseable date {:?}, using default", text);
            None
        }
    }
}

/// `yyyymmdd`, digits only.
fn parse_compact_date(text: &str) -> Option<NaiveDateTime> {
    if !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year = text[0..4].parse().ok()?;
    let month = text[4..6].parse().ok()?;
    let day = text[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(0, 0, 0)
}

/// Tolerates partial dates such as `20230000`; no validation beyond length.
fn lenient_date(value: &Value) -> Option<String> {
    let text = match date_input(value)? {
        DateInput::Formatted(s) => return Some(s),
        DateInput::Text(s) => s,
    };

    let chars: Vec<char> = text.chars().collect();
    match chars.len() {
        n if n < 8 => None,
        8 => {
            let part = |r: std::ops::Range<usize>| chars[r].iter().collect::<String>();
            Some(format!(
                "{}-{}-{} 00:00:00",
                part(0..4),
                part(4..6),
                part(6..8)
            ))
        }
        _ => Some(text.replace('/', "-")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Value {
        Value::from(s)
    }

    #[test]
    fn test_from_tag() {
        assert_eq!(Decoder::from_tag("date"), Decoder::Date);
        assert_eq!(Decoder::from_tag("cdaten"), Decoder::CustomDateNow);
        assert_eq!(Decoder::from_tag("int"), Decoder::Int);
        assert_eq!(Decoder::from_tag("nope"), Decoder::Raw);
        assert_eq!(Decoder::from_tag(""), Decoder::Raw);
    }

    #[test]
    fn test_compact_date() {
        assert_eq!(
            Decoder::Date.decode(text("20230115")),
            text("2023-01-15 00:00:00")
        );
        assert_eq!(Decoder::Date.decode(text("20231345")), Value::Null);
        assert_eq!(Decoder::Date.decode(text("2023011x")), Value::Null);
    }

    #[test]
    fn test_slash_and_dash_decode_identically() {
        for (slashed, dashed) in [
            ("2023/01/15", "2023-01-15"),
            ("2023/01/15 08:30:00", "2023-01-15 08:30:00"),
            ("2023/01/15 08:30:00.250000", "2023-01-15 08:30:00.250000"),
        ] {
            for decoder in [Decoder::Date, Decoder::CustomDate] {
                assert_eq!(decoder.decode(text(slashed)), decoder.decode(text(dashed)));
            }
        }
        assert_eq!(
            Decoder::Date.decode(text("2023/01/15")),
            text("2023-01-15 00:00:00")
        );
    }

    #[test]
    fn test_fractional_seconds() {
        assert_eq!(
            Decoder::Date.decode(text("2023-01-15 08:30:00.250000")),
            text("2023-01-15 08:30:00.250000")
        );
        assert_eq!(
            Decoder::Date.decode(text("2023-01-15 08:30:00.000000")),
            text("2023-01-15 08:30:00")
        );
    }

    #[test]
    fn test_short_or_null_input_uses_default() {
        assert_eq!(Decoder::Date.decode(text("2023")), Value::Null);
        assert_eq!(Decoder::Date.decode(Value::Null), Value::Null);
        assert_eq!(Decoder::CustomDate.decode(text("1/2/3")), Value::Null);

        let now = Decoder::DateNow.decode(Value::Null);
        let now = now.as_text().unwrap().into_owned();
        assert!(NaiveDateTime::parse_from_str(&now, TIMESTAMP_FORMAT).is_ok());

        let now = Decoder::CustomDateNow.decode(text("bad"));
        assert_eq!(now.as_text().unwrap().len(), 19);
    }

    #[test]
    fn test_custom_date_is_lenient() {
        assert_eq!(
            Decoder::CustomDate.decode(text("20230000")),
            text("2023-00-00 00:00:00")
        );
        assert_eq!(Decoder::Date.decode(text("20230000")), Value::Null);

        // Longer strings are passed through with only the separator normalized.
        assert_eq!(
            Decoder::CustomDate.decode(text("2023/00/00 xx")),
            text("2023-00-00 xx")
        );
    }

    #[test]
    fn test_native_datetime_and_timestamp() {
        let dt = NaiveDate::from_ymd_opt(2022, 5, 6)
            .unwrap()
            .and_hms_opt(7, 8, 9)
            .unwrap();
        assert_eq!(
            Decoder::Date.decode(Value::DateTime(dt)),
            text("2022-05-06 07:08:09")
        );
        assert_eq!(
            Decoder::Date.decode(Value::Date(dt.date())),
            text("2022-05-06 00:00:00")
        );

        let expected = Local
            .timestamp_opt(1_700_000_000, 0)
            .single()
            .unwrap()
            .format(TIMESTAMP_FORMAT)
            .to_string();
        assert_eq!(
            Decoder::Date.decode(Value::Int(1_700_000_000)),
            Value::Text(expected.clone())
        );
        assert_eq!(
            Decoder::CustomDate.decode(Value::Float(1_700_000_000.0)),
            Value::Text(expected)
        );
    }

    #[test]
    fn test_numeric_decoders() {
        assert_eq!(Decoder::Int.decode(text(" 42 ")), Value::Int(42));
        assert_eq!(Decoder::Int.decode(Value::Float(3.9)), Value::Int(3));
        assert_eq!(Decoder::Int.decode(text("x")), Value::Null);
        assert_eq!(Decoder::Float.decode(text("2.5")), Value::Float(2.5));
        assert_eq!(Decoder::Float.decode(Value::Int(2)), Value::Float(2.0));
        assert_eq!(Decoder::Float.decode(text("x")), Value::Null);
        assert_eq!(Decoder::Str.decode(Value::Int(7)), text("7"));
        assert_eq!(Decoder::Str.decode(Value::Null), Value::Null);
    }

    #[test]
    fn test_scalar_decoders_are_idempotent() {
        let inputs = [
            text("12"),
            text(" 7 "),
            text("1.25"),
            text("abc"),
            Value::Int(-3),
            Value::Float(4.5),
            Value::Null,
        ];
        for decoder in [Decoder::Int, Decoder::Str, Decoder::Float] {
            for input in &inputs {
                let once = decoder.decode(input.clone());
                assert_eq!(decoder.decode(once.clone()), once, "{:?} {:?}", decoder, input);
            }
        }
    }

    #[test]
    fn test_json_decoder() {
        assert_eq!(
            Decoder::Json.decode(text(r#"{"a": 1}"#)),
            Value::Json(serde_json::json!({"a": 1}))
        );
        assert_eq!(Decoder::Json.decode(text("5")), Value::Int(5));
        assert_eq!(Decoder::Json.decode(text("{broken")), Value::Null);
        assert_eq!(Decoder::Json.decode(Value::Int(3)), Value::Int(3));
    }
}
