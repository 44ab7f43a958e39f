use crate::{
    core::{
        data_type::FieldType,
        utils::{is_iso_duration, parse_datetime_text, parse_time_text},
        value::Value,
    },
    error::SchemaError,
    records::row::Row,
    schema::descriptor::{Descriptor, Field},
};
use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::str::FromStr;
use uuid::Uuid;

const TRUE_VALUES: [&str; 4] = ["true", "True", "TRUE", "1"];
const FALSE_VALUES: [&str; 4] = ["false", "False", "FALSE", "0"];

/// Casts every value of `row` to its positional field's type.
pub fn cast_row(descriptor: &Descriptor, row: Row) -> Result<Row, SchemaError> {
    if row.len() != descriptor.len() {
        return Err(SchemaError::RowLength {
            expected: descriptor.len(),
            actual: row.len(),
        });
    }

    descriptor
        .fields
        .iter()
        .zip(row)
        .map(|(field, value)| cast_value(field, value, &descriptor.missing_values))
        .collect()
}

/// Casts a single value to the field's declared type, honouring missing
/// values and the `required` constraint.
pub fn cast_value(field: &Field, value: Value, missing: &[String]) -> Result<Value, SchemaError> {
    let is_missing = match &value {
        Value::Null => true,
        Value::String(s) => missing.iter().any(|m| m == s),
        _ => false,
    };

    if is_missing {
        if field.is_required() {
            return Err(SchemaError::RequiredMissing {
                field: field.name.clone(),
            });
        }
        return Ok(Value::Null);
    }

    let format = field.format();
    let cast = match field.field_type {
        FieldType::String => cast_string(format, value),
        FieldType::Integer => cast_integer(value),
        FieldType::Number => cast_number(value),
        FieldType::Boolean => cast_boolean(value),
        FieldType::Date => cast_date(format, value),
        FieldType::Time => cast_time(format, value),
        FieldType::Datetime => cast_datetime(format, value),
        FieldType::Year => cast_year(value),
        FieldType::Yearmonth => cast_yearmonth(value),
        FieldType::Duration => cast_duration(value),
        FieldType::Array => cast_json(value, |v| v.is_array()),
        FieldType::Object => cast_json(value, |v| v.is_object()),
        FieldType::Geojson => cast_json(value, |v| v.get("type").is_some_and(|t| t.is_string())),
        FieldType::Geopoint => cast_geopoint(format, value),
        FieldType::Any => Ok(value),
    };

    cast.map_err(|value| SchemaError::Cast {
        field: field.name.clone(),
        field_type: field.field_type,
        value: value.to_string(),
    })
}

// Each caster returns the rejected value on failure so the error can quote it.
type CastResult = Result<Value, Value>;

fn cast_string(format: &str, value: Value) -> CastResult {
    let Value::String(s) = value else {
        return Err(value);
    };

    let valid = match format {
        "email" => s.split_once('@').is_some_and(|(l, d)| !l.is_empty() && d.contains('.')),
        "uri" => s.split_once(':').is_some_and(|(scheme, _)| !scheme.is_empty()),
        "uuid" => Uuid::parse_str(&s).is_ok(),
        _ => true,
    };

    if valid { Ok(Value::String(s)) } else { Err(Value::String(s)) }
}

fn cast_integer(value: Value) -> CastResult {
    match value {
        Value::Integer(_) => Ok(value),
        Value::Number(ref n) if n.is_integer() => n.to_i64().map(Value::Integer).ok_or(value),
        Value::String(ref s) => s.trim().parse::<i64>().map(Value::Integer).map_err(|_| value),
        Value::Json(ref v) => v.as_i64().map(Value::Integer).ok_or(value),
        other => Err(other),
    }
}

fn cast_number(value: Value) -> CastResult {
    match value {
        Value::Number(_) => Ok(value),
        Value::Integer(v) => Ok(Value::Number(BigDecimal::from(v))),
        Value::String(ref s) => BigDecimal::from_str(s.trim())
            .map(Value::Number)
            .map_err(|_| value),
        Value::Json(ref v) if v.is_number() => value
            .as_big_decimal()
            .map(Value::Number)
            .ok_or(value),
        other => Err(other),
    }
}

fn cast_boolean(value: Value) -> CastResult {
    match value {
        Value::Boolean(_) => Ok(value),
        Value::String(ref s) if TRUE_VALUES.contains(&s.trim()) => Ok(Value::Boolean(true)),
        Value::String(ref s) if FALSE_VALUES.contains(&s.trim()) => Ok(Value::Boolean(false)),
        other => Err(other),
    }
}

fn pattern(format: &str) -> &str {
    format.strip_prefix("fmt:").unwrap_or(format)
}

fn cast_date(format: &str, value: Value) -> CastResult {
    let Value::String(ref s) = value else {
        return match value {
            Value::Date(_) => Ok(value),
            Value::Datetime(dt) if dt.time() == NaiveTime::default() => Ok(Value::Date(dt.date())),
            other => Err(other),
        };
    };

    let parsed = match format {
        "default" => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok(),
        "any" => parse_datetime_text(s).map(|dt| dt.date()),
        custom => NaiveDate::parse_from_str(s.trim(), pattern(custom)).ok(),
    };
    parsed.map(Value::Date).ok_or(value)
}

fn cast_time(format: &str, value: Value) -> CastResult {
    let Value::String(ref s) = value else {
        return match value {
            Value::Time(_) => Ok(value),
            other => Err(other),
        };
    };

    let parsed = match format {
        "default" => NaiveTime::parse_from_str(s.trim(), "%H:%M:%S%.f").ok(),
        "any" => parse_time_text(s).or_else(|| parse_datetime_text(s).map(|dt| dt.time())),
        custom => NaiveTime::parse_from_str(s.trim(), pattern(custom)).ok(),
    };
    parsed.map(Value::Time).ok_or(value)
}

fn cast_datetime(format: &str, value: Value) -> CastResult {
    let Value::String(ref s) = value else {
        return match value {
            Value::Datetime(_) => Ok(value),
            other => Err(other),
        };
    };

    let parsed = match format {
        "default" => {
            let trimmed = s.trim();
            NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.fZ")
                .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f"))
                .ok()
                .or_else(|| {
                    chrono::DateTime::parse_from_rfc3339(trimmed)
                        .map(|dt| dt.naive_utc())
                        .ok()
                })
        }
        "any" => parse_datetime_text(s),
        custom => NaiveDateTime::parse_from_str(s.trim(), pattern(custom)).ok(),
    };
    parsed.map(Value::Datetime).ok_or(value)
}

fn cast_year(value: Value) -> CastResult {
    if let Value::Year(_) = value {
        return Ok(value);
    }

    let year = match &value {
        Value::Integer(v) => i32::try_from(*v).ok(),
        Value::String(s) => s.trim().parse::<i32>().ok(),
        _ => None,
    };

    match year {
        Some(y) if (0..=9999).contains(&y) => Ok(Value::Year(y)),
        _ => Err(value),
    }
}

fn cast_yearmonth(value: Value) -> CastResult {
    if let Value::YearMonth { .. } = value {
        return Ok(value);
    }

    let parts = match &value {
        Value::String(s) => s
            .trim()
            .split_once('-')
            .and_then(|(y, m)| Some((y.parse::<i32>().ok()?, m.parse::<u32>().ok()?))),
        Value::Json(serde_json::Value::Array(items)) if items.len() == 2 => items[0]
            .as_i64()
            .zip(items[1].as_u64())
            .and_then(|(y, m)| Some((i32::try_from(y).ok()?, u32::try_from(m).ok()?))),
        _ => None,
    };

    match parts {
        Some((year, month)) if (1..=12).contains(&month) => Ok(Value::YearMonth { year, month }),
        _ => Err(value),
    }
}

fn cast_duration(value: Value) -> CastResult {
    match value {
        Value::Duration(_) => Ok(value),
        Value::String(s) if is_iso_duration(s.trim()) => Ok(Value::Duration(s.trim().to_string())),
        other => Err(other),
    }
}

fn cast_json(value: Value, accept: impl Fn(&serde_json::Value) -> bool) -> CastResult {
    let parsed = match &value {
        Value::Json(v) => Some(v.clone()),
        Value::String(s) => serde_json::from_str::<serde_json::Value>(s).ok(),
        _ => None,
    };

    match parsed {
        Some(json) if accept(&json) => Ok(Value::Json(json)),
        _ => Err(value),
    }
}

fn cast_geopoint(format: &str, value: Value) -> CastResult {
    if let Value::GeoPoint { .. } = value {
        return Ok(value);
    }

    let json = match &value {
        Value::Json(v) => Some(v.clone()),
        Value::String(s) if format != "default" => serde_json::from_str(s).ok(),
        _ => None,
    };

    let coords: Option<(f64, f64)> = match (format, &value, json) {
        ("default", Value::String(s), _) => s
            .split_once(',')
            .and_then(|(lon, lat)| Some((lon.trim().parse().ok()?, lat.trim().parse().ok()?))),
        ("array", _, Some(serde_json::Value::Array(items))) if items.len() == 2 => {
            items[0].as_f64().zip(items[1].as_f64())
        }
        ("object", _, Some(serde_json::Value::Object(map))) => map
            .get("lon")
            .and_then(|v| v.as_f64())
            .zip(map.get("lat").and_then(|v| v.as_f64())),
        _ => None,
    };

    match coords {
        Some((lon, lat)) if (-180.0..=180.0).contains(&lon) && (-90.0..=90.0).contains(&lat) => {
            Ok(Value::GeoPoint { lon, lat })
        }
        _ => Err(value),
    }
}
