//! Field values produced by row sources
//!
//! Sources hand rows to the export pipeline as tuples of [`Value`], one entry
//! per configured field, in declared field order.

use chrono::{DateTime, NaiveDate, Utc};
use mongodb::bson::Bson;

/// A single field value of a source row
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
}

/// One source row, fields in declared order
pub type Row = Vec<Value>;

impl From<&Bson> for Value {
    fn from(value: &Bson) -> Self {
        match value {
            Bson::Null | Bson::Undefined => Value::Null,
            Bson::Boolean(b) => Value::Bool(*b),
            Bson::Int32(n) => Value::Int(i64::from(*n)),
            Bson::Int64(n) => Value::Int(*n),
            Bson::Double(f) => Value::Float(*f),
            Bson::String(s) => Value::Text(s.clone()),
            Bson::ObjectId(oid) => Value::Text(oid.to_hex()),
            Bson::Decimal128(d) => Value::Text(d.to_string()),
            Bson::DateTime(dt) => DateTime::from_timestamp_millis(dt.timestamp_millis())
                .map(Value::DateTime)
                .unwrap_or(Value::Null),
            Bson::Timestamp(ts) => DateTime::from_timestamp(i64::from(ts.time), 0)
                .map(Value::DateTime)
                .unwrap_or(Value::Null),
            other => Value::Text(other.to_string()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Value::DateTime(dt)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::oid::ObjectId;

    #[test]
    fn test_from_bson_scalars() {
        assert_eq!(Value::from(&Bson::Null), Value::Null);
        assert_eq!(Value::from(&Bson::Int32(7)), Value::Int(7));
        assert_eq!(Value::from(&Bson::Boolean(true)), Value::Bool(true));
        assert_eq!(
            Value::from(&Bson::String("ada".into())),
            Value::Text("ada".into())
        );
    }

    #[test]
    fn test_from_bson_object_id_is_hex() {
        let oid = ObjectId::new();
        assert_eq!(Value::from(&Bson::ObjectId(oid)), Value::Text(oid.to_hex()));
    }

    #[test]
    fn test_from_bson_datetime() {
        let dt = mongodb::bson::DateTime::from_millis(1_700_000_000_000);
        match Value::from(&Bson::DateTime(dt)) {
            Value::DateTime(parsed) => assert_eq!(parsed.timestamp(), 1_700_000_000),
            other => panic!("unexpected value: {other:?}"),
        }
    }

    #[test]
    fn test_from_option() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::Text("x".into()));
    }
}
