// Result Row Values
// Driver-neutral representation of a single result row

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;

/// Exact fixed-point number as returned by DECIMAL/NUMERIC/MONEY columns.
///
/// The value is `mantissa * 10^-scale`. The scale is kept as-is so that
/// `12.50` never collapses to `12.5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decimal {
    mantissa: i128,
    scale: u8,
}

impl Decimal {
    pub fn new(mantissa: i128, scale: u8) -> Self {
        Self { mantissa, scale }
    }

    pub fn mantissa(&self) -> i128 {
        self.mantissa
    }

    pub fn scale(&self) -> u8 {
        self.scale
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.mantissa < 0 { "-" } else { "" };
        let digits = self.mantissa.unsigned_abs().to_string();
        let scale = usize::from(self.scale);

        if scale == 0 {
            return write!(f, "{sign}{digits}");
        }

        // Left-pad so there is always at least one integral digit
        let padded = format!("{digits:0>width$}", width = scale + 1);
        let (integral, fractional) = padded.split_at(padded.len() - scale);
        write!(f, "{sign}{integral}.{fractional}")
    }
}

/// A raw, typed value read from a result set column
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    DateTimeOffset(DateTime<FixedOffset>),
    Decimal(Decimal),
    Guid(uuid::Uuid),
    Binary(Vec<u8>),
}

/// A single result row: column names paired with their raw values, in column order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    columns: Vec<(String, SqlValue)>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style column append
    pub fn with(mut self, name: impl Into<String>, value: SqlValue) -> Self {
        self.push(name, value);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, value: SqlValue) {
        self.columns.push((name.into(), value));
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl FromIterator<(String, SqlValue)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (String, SqlValue)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_keeps_trailing_zeros() {
        assert_eq!(Decimal::new(1250, 2).to_string(), "12.50");
        assert_eq!(Decimal::new(125_000, 4).to_string(), "12.5000");
    }

    #[test]
    fn test_decimal_fraction_only() {
        assert_eq!(Decimal::new(5, 3).to_string(), "0.005");
        assert_eq!(Decimal::new(-5, 3).to_string(), "-0.005");
        assert_eq!(Decimal::new(0, 2).to_string(), "0.00");
    }

    #[test]
    fn test_decimal_integral() {
        assert_eq!(Decimal::new(42, 0).to_string(), "42");
        assert_eq!(Decimal::new(-42, 0).to_string(), "-42");
        assert_eq!(Decimal::new(-123_456, 2).to_string(), "-1234.56");
    }

    #[test]
    fn test_decimal_wide_mantissa() {
        // DECIMAL(38, 10) upper range
        let value = Decimal::new(12_345_678_901_234_567_890_123_456_789_012_345_678, 10);
        assert_eq!(value.to_string(), "1234567890123456789012345678.9012345678");
    }

    #[test]
    fn test_raw_row_preserves_column_order() {
        let row = RawRow::new()
            .with("id", SqlValue::Int(1))
            .with("name", SqlValue::String("Ann".to_string()))
            .with("age", SqlValue::Null);

        let names: Vec<&str> = row.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["id", "name", "age"]);
        assert_eq!(row.len(), 3);
        assert!(!row.is_empty());
    }
}
