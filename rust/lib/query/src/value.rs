//! Typed attribute values and their conversion to and from bind values.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use openerp_sql::Value;
use uuid::Uuid;

use crate::error::QueryError;
use crate::record::Record;
use crate::schema::FieldType;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";
const TIME_FORMAT: &str = "%H:%M:%S";

/// Value of a single record attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Time(NaiveTime),
    Binary(Vec<u8>),
    Uuid(Uuid),
    Json(serde_json::Value),
    Record(Box<Record>),
    List(Vec<FieldValue>),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            FieldValue::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Text used when a non-text value meets a pattern operator.
    pub fn search_text(&self) -> Option<String> {
        match self {
            FieldValue::Null | FieldValue::Record(_) | FieldValue::List(_) | FieldValue::Binary(_) => None,
            FieldValue::Text(s) => Some(s.clone()),
            other => match other.to_sql() {
                Ok(Value::Text(s)) => Some(s),
                Ok(Value::Integer(i)) => Some(i.to_string()),
                Ok(Value::Real(f)) => Some(f.to_string()),
                _ => None,
            },
        }
    }

    /// Bind value for this attribute value.
    pub fn to_sql(&self) -> Result<Value, QueryError> {
        Ok(match self {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(b) => Value::Integer(i64::from(*b)),
            FieldValue::Int(i) => Value::Integer(*i),
            FieldValue::Double(f) => Value::Real(*f),
            FieldValue::Text(s) => Value::Text(s.clone()),
            FieldValue::Date(d) => Value::Text(d.format(DATE_FORMAT).to_string()),
            FieldValue::Timestamp(ts) => Value::Text(ts.format(TIMESTAMP_FORMAT).to_string()),
            FieldValue::Time(t) => Value::Text(t.format(TIME_FORMAT).to_string()),
            FieldValue::Binary(b) => Value::Blob(b.clone()),
            FieldValue::Uuid(u) => Value::Text(u.hyphenated().to_string()),
            FieldValue::Json(j) => Value::Text(j.to_string()),
            FieldValue::Record(_) | FieldValue::List(_) => {
                return Err(QueryError::value("<value>", "nested values cannot be bound"));
            }
        })
    }

    /// Decode a fetched column according to the declared attribute type.
    pub fn from_sql(ty: FieldType, value: Value) -> Result<FieldValue, QueryError> {
        let mismatch = |v: &Value| QueryError::value("<column>", format!("cannot read {v:?} as {ty:?}"));

        if value.is_null() {
            return Ok(FieldValue::Null);
        }

        Ok(match ty {
            FieldType::String | FieldType::LargeText | FieldType::Geometry => match value {
                Value::Text(s) => FieldValue::Text(s),
                Value::Integer(i) => FieldValue::Text(i.to_string()),
                Value::Real(f) => FieldValue::Text(f.to_string()),
                Value::Blob(b) => FieldValue::Text(String::from_utf8_lossy(&b).into_owned()),
                Value::Null => FieldValue::Null,
            },
            FieldType::Integer | FieldType::Long => match &value {
                Value::Integer(i) => FieldValue::Int(*i),
                Value::Real(f) => FieldValue::Int(*f as i64),
                Value::Text(s) => FieldValue::Int(s.trim().parse().map_err(|_| mismatch(&value))?),
                _ => return Err(mismatch(&value)),
            },
            FieldType::Double => match &value {
                Value::Real(f) => FieldValue::Double(*f),
                Value::Integer(i) => FieldValue::Double(*i as f64),
                Value::Text(s) => FieldValue::Double(s.trim().parse().map_err(|_| mismatch(&value))?),
                _ => return Err(mismatch(&value)),
            },
            FieldType::Boolean => match &value {
                Value::Integer(i) => FieldValue::Bool(*i != 0),
                Value::Text(s) => match s.as_str() {
                    "1" | "true" | "TRUE" | "Y" => FieldValue::Bool(true),
                    "0" | "false" | "FALSE" | "N" => FieldValue::Bool(false),
                    _ => return Err(mismatch(&value)),
                },
                _ => return Err(mismatch(&value)),
            },
            FieldType::Date => match &value {
                Value::Text(s) => FieldValue::Date(parse_date(s).ok_or_else(|| mismatch(&value))?),
                _ => return Err(mismatch(&value)),
            },
            FieldType::Timestamp => match &value {
                Value::Text(s) => {
                    FieldValue::Timestamp(parse_timestamp(s).ok_or_else(|| mismatch(&value))?)
                }
                Value::Integer(ms) => FieldValue::Timestamp(
                    DateTime::from_timestamp_millis(*ms)
                        .ok_or_else(|| mismatch(&value))?
                        .naive_utc(),
                ),
                _ => return Err(mismatch(&value)),
            },
            FieldType::Time => match &value {
                Value::Text(s) => FieldValue::Time(
                    NaiveTime::parse_from_str(s, "%H:%M:%S%.f").map_err(|_| mismatch(&value))?,
                ),
                _ => return Err(mismatch(&value)),
            },
            FieldType::Binary => match value {
                Value::Blob(b) => FieldValue::Binary(b),
                Value::Text(s) => FieldValue::Binary(s.into_bytes()),
                other => return Err(mismatch(&other)),
            },
            FieldType::Uuid => match &value {
                Value::Text(s) => FieldValue::Uuid(Uuid::parse_str(s).map_err(|_| mismatch(&value))?),
                Value::Blob(b) => FieldValue::Uuid(Uuid::from_slice(b).map_err(|_| mismatch(&value))?),
                _ => return Err(mismatch(&value)),
            },
            FieldType::Json => match &value {
                Value::Text(s) => FieldValue::Json(serde_json::from_str(s).map_err(|_| mismatch(&value))?),
                Value::Integer(i) => FieldValue::Json(serde_json::json!(i)),
                Value::Real(f) => FieldValue::Json(serde_json::json!(f)),
                _ => return Err(mismatch(&value)),
            },
            FieldType::Record | FieldType::List => return Err(mismatch(&value)),
        })
    }
}

impl FieldType {
    /// Normalise a value assigned to an attribute of this type, so that
    /// values set by callers compare equal to values read back from storage.
    /// Values that cannot be converted are returned unchanged.
    pub fn coerce(&self, value: FieldValue) -> FieldValue {
        match (self, value) {
            (FieldType::Double, FieldValue::Int(i)) => FieldValue::Double(i as f64),
            (FieldType::Integer | FieldType::Long, FieldValue::Double(f)) if f.fract() == 0.0 => {
                FieldValue::Int(f as i64)
            }
            (FieldType::Boolean, FieldValue::Int(i)) if i == 0 || i == 1 => FieldValue::Bool(i == 1),
            (FieldType::Date, FieldValue::Text(s)) => match parse_date(&s) {
                Some(d) => FieldValue::Date(d),
                None => FieldValue::Text(s),
            },
            (FieldType::Date, FieldValue::Timestamp(ts)) => FieldValue::Date(ts.date()),
            (FieldType::Timestamp, FieldValue::Text(s)) => match parse_timestamp(&s) {
                Some(ts) => FieldValue::Timestamp(ts),
                None => FieldValue::Text(s),
            },
            (FieldType::Timestamp, FieldValue::Date(d)) => FieldValue::Timestamp(d.and_time(NaiveTime::default())),
            (FieldType::Time, FieldValue::Text(s)) => match NaiveTime::parse_from_str(&s, "%H:%M:%S%.f") {
                Ok(t) => FieldValue::Time(t),
                Err(_) => FieldValue::Text(s),
            },
            (FieldType::Uuid, FieldValue::Text(s)) => match Uuid::parse_str(&s) {
                Ok(u) => FieldValue::Uuid(u),
                Err(_) => FieldValue::Text(s),
            },
            (_, other) => other,
        }
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .ok()
        .or_else(|| parse_timestamp(s).map(|ts| ts.date()))
}

/// Accepts the storage format, ISO 8601 with `T`, and RFC 3339 with offset.
pub(crate) fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_utc()))
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Int(i)
    }
}

impl From<i32> for FieldValue {
    fn from(i: i32) -> Self {
        FieldValue::Int(i64::from(i))
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        FieldValue::Double(f)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(d: NaiveDate) -> Self {
        FieldValue::Date(d)
    }
}

impl From<NaiveDateTime> for FieldValue {
    fn from(ts: NaiveDateTime) -> Self {
        FieldValue::Timestamp(ts)
    }
}

impl From<Uuid> for FieldValue {
    fn from(u: Uuid) -> Self {
        FieldValue::Uuid(u)
    }
}

impl From<Record> for FieldValue {
    fn from(r: Record) -> Self {
        FieldValue::Record(Box::new(r))
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(items: Vec<T>) -> Self {
        FieldValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(FieldValue::Null)
    }
}
