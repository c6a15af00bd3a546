// Row Formatter
// Converts a raw result row into a JSON-safe object

use super::value::{RawRow, SqlValue};
use chrono::{NaiveDateTime, NaiveTime, Timelike};
use serde_json::{Map, Number, Value};

/// A result row with every value converted to a JSON-safe representation
pub type FormattedRow = Map<String, Value>;

/// Format a single raw row.
///
/// Dates and times become ISO-8601 strings, decimals become their exact
/// decimal string, and everything else passes through unchanged.
pub fn format_row(row: &RawRow) -> FormattedRow {
    row.iter()
        .map(|(name, value)| (name.to_string(), format_value(value)))
        .collect()
}

pub fn format_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Bool(b) => Value::Bool(*b),
        SqlValue::Int(i) => Value::Number(Number::from(*i)),
        // JSON has no NaN/Infinity
        SqlValue::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
        SqlValue::String(s) => Value::String(s.clone()),
        SqlValue::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
        SqlValue::Time(t) => Value::String(iso_time(t)),
        SqlValue::DateTime(dt) => Value::String(iso_datetime(dt)),
        SqlValue::DateTimeOffset(dt) => Value::String(format!(
            "{}{}",
            iso_datetime(&dt.naive_local()),
            dt.format("%:z")
        )),
        SqlValue::Decimal(d) => Value::String(d.to_string()),
        SqlValue::Guid(u) => Value::String(u.to_string()),
        SqlValue::Binary(bytes) => Value::Array(
            bytes.iter().map(|b| Value::Number(Number::from(*b))).collect(),
        ),
    }
}

/// `HH:MM:SS`, with a `.ffffff` suffix only when there are sub-second digits
fn iso_time(t: &NaiveTime) -> String {
    let micros = t.nanosecond() / 1_000;
    if micros == 0 {
        t.format("%H:%M:%S").to_string()
    } else {
        format!("{}.{:06}", t.format("%H:%M:%S"), micros)
    }
}

fn iso_datetime(dt: &NaiveDateTime) -> String {
    format!("{}T{}", dt.date().format("%Y-%m-%d"), iso_time(&dt.time()))
}
