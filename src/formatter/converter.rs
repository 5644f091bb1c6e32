//! Value-to-text conversion for CSV export

use chrono::{DateTime, NaiveDate, Utc};

use super::value::Value;

/// Timestamp layout used in exported files: UTC, second resolution, no offset.
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Trait for rendering field values as text
///
/// Each value kind has its own hook; `convert` dispatches on the variant.
pub trait ValueConverter {
    fn format_null(&self) -> String;
    fn format_bool(&self, b: bool) -> String;
    fn format_int(&self, n: i64) -> String;
    fn format_float(&self, f: f64) -> String;
    fn format_text(&self, s: &str) -> String;
    fn format_date(&self, d: &NaiveDate) -> String;
    fn format_datetime(&self, dt: &DateTime<Utc>) -> String;

    /// Convert a value to text (provided implementation)
    fn convert(&self, value: &Value) -> String {
        match value {
            Value::Null => self.format_null(),
            Value::Bool(b) => self.format_bool(*b),
            Value::Int(n) => self.format_int(*n),
            Value::Float(f) => self.format_float(*f),
            Value::Text(s) => self.format_text(s),
            Value::Date(d) => self.format_date(d),
            Value::DateTime(dt) => self.format_datetime(dt),
        }
    }
}

/// Converter producing warehouse-loadable CSV field text
///
/// - null becomes an empty field
/// - booleans become `0` / `1`
/// - dates and timestamps become `YYYY-MM-DDTHH:MM:SS` in UTC
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvValueConverter;

impl CsvValueConverter {
    /// Create a new CSV value converter
    pub fn new() -> Self {
        Self
    }
}

impl ValueConverter for CsvValueConverter {
    fn format_null(&self) -> String {
        String::new()
    }

    fn format_bool(&self, b: bool) -> String {
        String::from(if b { "1" } else { "0" })
    }

    fn format_int(&self, n: i64) -> String {
        n.to_string()
    }

    fn format_float(&self, f: f64) -> String {
        f.to_string()
    }

    fn format_text(&self, s: &str) -> String {
        s.to_string()
    }

    fn format_date(&self, d: &NaiveDate) -> String {
        d.and_hms_opt(0, 0, 0)
            .map(|dt| dt.format(DATETIME_FORMAT).to_string())
            .unwrap_or_default()
    }

    fn format_datetime(&self, dt: &DateTime<Utc>) -> String {
        dt.format(DATETIME_FORMAT).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    #[test]
    fn test_scalars() {
        let c = CsvValueConverter::new();
        assert_eq!(c.convert(&Value::Null), "");
        assert_eq!(c.convert(&Value::Bool(true)), "1");
        assert_eq!(c.convert(&Value::Bool(false)), "0");
        assert_eq!(c.convert(&Value::Int(-42)), "-42");
        assert_eq!(c.convert(&Value::Float(2.5)), "2.5");
        assert_eq!(c.convert(&Value::Text("plain".into())), "plain");
    }

    #[test]
    fn test_datetime_is_utc_without_offset() {
        let c = CsvValueConverter::new();
        let local = FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 1, 12, 30, 5)
            .unwrap();
        let value = Value::DateTime(local.with_timezone(&Utc));
        assert_eq!(c.convert(&value), "2024-03-01T10:30:05");
    }

    #[test]
    fn test_date_renders_midnight() {
        let c = CsvValueConverter::new();
        let d = NaiveDate::from_ymd_opt(1999, 12, 31).unwrap();
        assert_eq!(c.convert(&Value::Date(d)), "1999-12-31T00:00:00");
    }
}
