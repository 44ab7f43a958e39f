use crate::core::data_type::FieldType;
use thiserror::Error;

/// Errors raised while parsing, validating or casting against a descriptor.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The descriptor is structurally malformed.
    #[error("Invalid descriptor: {0}")]
    InvalidDescriptor(String),

    /// Two fields share the same name.
    #[error("Duplicate field name: {0}")]
    DuplicateField(String),

    /// A field carries a format its type does not understand.
    #[error("Field \"{field}\" of type {field_type} has unsupported format \"{format}\"")]
    InvalidFormat {
        field: String,
        field_type: FieldType,
        format: String,
    },

    /// A value could not be cast to the field's declared type.
    #[error("Field \"{field}\" can't cast value \"{value}\" to type {field_type}")]
    Cast {
        field: String,
        field_type: FieldType,
        value: String,
    },

    /// A required field received a missing value.
    #[error("Field \"{field}\" is required but the value is missing")]
    RequiredMissing { field: String },

    /// A row's width does not match the descriptor.
    #[error("Row has {actual} values but the descriptor has {expected} fields")]
    RowLength { expected: usize, actual: usize },

    /// The descriptor JSON could not be parsed.
    #[error("Descriptor JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
