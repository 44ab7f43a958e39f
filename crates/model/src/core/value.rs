use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Number(BigDecimal),
    String(String),
    Date(NaiveDate),
    Time(NaiveTime),
    Datetime(NaiveDateTime),
    Year(i32),
    YearMonth { year: i32, month: u32 },
    /// ISO-8601 duration text, e.g. `P1Y2M3DT4H`.
    Duration(String),
    GeoPoint { lon: f64, lat: f64 },
    /// Arrays, objects and GeoJSON documents.
    Json(serde_json::Value),
}

impl Value {
    pub fn as_big_decimal(&self) -> Option<BigDecimal> {
        match self {
            Value::Integer(v) => Some(BigDecimal::from(*v)),
            Value::Number(v) => Some(v.clone()),
            Value::String(s) => BigDecimal::from_str(s.trim()).ok(),
            Value::Json(serde_json::Value::Number(n)) => BigDecimal::from_str(&n.to_string()).ok(),
            _ => None,
        }
    }

    /// Builds a value from a JSON document. Numbers become `Integer` when they
    /// fit an `i64`, `Number` otherwise; arrays and objects stay JSON.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => BigDecimal::from_str(&n.to_string())
                    .map(Value::Number)
                    .unwrap_or_else(|_| Value::Json(serde_json::Value::Number(n))),
            },
            serde_json::Value::String(s) => Value::String(s),
            other => Value::Json(other),
        }
    }

    /// Serialized text used when a value is stored in a column that cannot hold
    /// it natively: JSON for structured values, display text for scalars.
    pub fn stringify(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Json(v) => Some(v.to_string()),
            other => Some(other.to_string()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::from_json(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, ""),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Number(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v}"),
            Value::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            Value::Time(v) => write!(f, "{}", v.format("%H:%M:%S%.f")),
            Value::Datetime(v) => write!(f, "{}", v.format("%Y-%m-%dT%H:%M:%S%.f")),
            Value::Year(v) => write!(f, "{v}"),
            Value::YearMonth { year, month } => write!(f, "{year:04}-{month:02}"),
            Value::Duration(v) => write!(f, "{v}"),
            Value::GeoPoint { lon, lat } => write!(f, "{lon}, {lat}"),
            Value::Json(v) => write!(f, "{v}"),
        }
    }
}
