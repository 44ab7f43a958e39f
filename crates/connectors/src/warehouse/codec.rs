use crate::{
    error::StorageError,
    warehouse::{descriptor::FallbackSet, native::NativeRow},
};
use model::{
    core::{data_type::FieldType, utils::parse_datetime_text, value::Value},
    error::SchemaError,
    records::row::Row,
    schema::{
        cast::{cast_row, cast_value},
        descriptor::Descriptor,
    },
};
use std::cmp::Ordering;

/// Prepares a row for loading. Fallback positions are serialized to text;
/// every other value is cast to its field's type.
pub fn convert_row(
    row: Row,
    descriptor: &Descriptor,
    fallbacks: &FallbackSet,
) -> Result<Row, StorageError> {
    if row.len() != descriptor.len() {
        return Err(SchemaError::RowLength {
            expected: descriptor.len(),
            actual: row.len(),
        }
        .into());
    }

    descriptor
        .fields
        .iter()
        .zip(row)
        .enumerate()
        .map(|(index, (field, value))| {
            if !fallbacks.contains(&index) {
                return Ok(cast_value(field, value, &descriptor.missing_values)?);
            }

            let text = match &value {
                Value::String(raw) if descriptor.is_missing(raw) => None,
                _ => value.stringify(),
            };

            match text {
                Some(text) => Ok(Value::String(text)),
                None if field.is_required() => Err(SchemaError::RequiredMissing {
                    field: field.name.clone(),
                }
                .into()),
                None => Ok(Value::Null),
            }
        })
        .collect()
}

/// Rebuilds a typed row from the text cells the warehouse returns. Temporal
/// cells are parsed first, then the whole row goes through the casting rules.
pub fn restore_row(row: NativeRow, descriptor: &Descriptor) -> Result<Row, StorageError> {
    if row.len() != descriptor.len() {
        return Err(SchemaError::RowLength {
            expected: descriptor.len(),
            actual: row.len(),
        }
        .into());
    }

    let values = descriptor
        .fields
        .iter()
        .zip(row)
        .map(|(field, cell)| {
            let Some(text) = cell else {
                return Ok(Value::Null);
            };

            if !field.field_type.is_temporal() || descriptor.is_missing(&text) {
                return Ok(Value::String(text));
            }

            let parsed = parse_datetime_text(&text).ok_or_else(|| SchemaError::Cast {
                field: field.name.clone(),
                field_type: field.field_type,
                value: text.clone(),
            })?;

            Ok(match field.field_type {
                FieldType::Date => Value::Date(parsed.date()),
                FieldType::Time => Value::Time(parsed.time()),
                _ => Value::Datetime(parsed),
            })
        })
        .collect::<Result<Row, SchemaError>>()?;

    Ok(cast_row(descriptor, values)?)
}

/// Orders rows by the text of their first cell, nulls last. Only the first
/// column participates, and the comparison is on text, not typed values.
pub fn sort_rows(rows: &mut [NativeRow]) {
    rows.sort_by(|a, b| compare_leading(leading(a), leading(b)));
}

fn leading(row: &NativeRow) -> Option<&str> {
    row.first().and_then(|cell| cell.as_deref())
}

fn compare_leading(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
