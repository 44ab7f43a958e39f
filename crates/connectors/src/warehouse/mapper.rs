use crate::{error::StorageError, warehouse::native::NativeType};
use model::core::data_type::FieldType;

/// Longest column name the warehouse accepts.
pub const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Native column type for a field type, or `None` when the warehouse has no
/// equivalent and the value must be stored as serialized text.
pub fn convert_type(field_type: FieldType) -> Option<NativeType> {
    match field_type {
        FieldType::String => Some(NativeType::String),
        FieldType::Integer => Some(NativeType::Integer),
        FieldType::Number => Some(NativeType::Float),
        FieldType::Boolean => Some(NativeType::Boolean),
        FieldType::Date => Some(NativeType::Date),
        FieldType::Time => Some(NativeType::Time),
        FieldType::Datetime => Some(NativeType::Datetime),
        FieldType::Year => Some(NativeType::Integer),
        FieldType::Any => Some(NativeType::String),
        FieldType::Array
        | FieldType::Object
        | FieldType::Duration
        | FieldType::Geojson
        | FieldType::Geopoint
        | FieldType::Yearmonth => None,
    }
}

/// Same as [`convert_type`] for a raw type tag.
pub fn convert_type_name(type_name: &str) -> Result<Option<NativeType>, StorageError> {
    let field_type =
        FieldType::from_name(type_name).map_err(|_| StorageError::UnsupportedType(type_name.into()))?;
    Ok(convert_type(field_type))
}

/// Field type for a native column type. `year` is not recoverable and comes
/// back as `integer`; fallback columns come back as `string`.
pub fn restore_type(native_type: &NativeType) -> Result<FieldType, StorageError> {
    match native_type {
        NativeType::String => Ok(FieldType::String),
        NativeType::Integer => Ok(FieldType::Integer),
        NativeType::Float => Ok(FieldType::Number),
        NativeType::Boolean => Ok(FieldType::Boolean),
        NativeType::Date => Ok(FieldType::Date),
        NativeType::Time => Ok(FieldType::Time),
        NativeType::Datetime => Ok(FieldType::Datetime),
        other => Err(StorageError::UnsupportedType(other.to_string())),
    }
}

/// Whether `name` already is a valid column name:
/// `[A-Za-z_][A-Za-z0-9_]{0,127}`.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    name.len() <= MAX_IDENTIFIER_LENGTH && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Maps a field name to a valid column name. Valid names pass through;
/// anything else is transliterated to ASCII and slugified (lowercase, runs of
/// other characters become a single `_`), prefixed with `_` when it would not
/// start with a letter or underscore, and truncated.
pub fn sanitize_identifier(name: &str) -> String {
    if is_valid_identifier(name) {
        return name.to_string();
    }

    let ascii = deunicode::deunicode(name);
    let mut slug = String::with_capacity(ascii.len());
    for ch in ascii.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }

    let slug = slug.trim_matches('_');
    let mut sanitized = match slug.chars().next() {
        Some(first) if first.is_ascii_alphabetic() => slug.to_string(),
        _ => format!("_{slug}"),
    };

    sanitized.truncate(MAX_IDENTIFIER_LENGTH);
    sanitized
}

/// Maps bucket names to prefixed table names and back.
#[derive(Debug, Clone, Default)]
pub struct Mapper {
    prefix: String,
}

impl Mapper {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn convert_bucket(&self, bucket: &str) -> String {
        format!("{}{bucket}", self.prefix)
    }

    /// `None` when the table does not carry this mapper's prefix.
    pub fn restore_bucket(&self, table_name: &str) -> Option<String> {
        table_name.strip_prefix(&self.prefix).map(str::to_string)
    }
}
