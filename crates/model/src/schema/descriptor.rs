use crate::{core::data_type::FieldType, error::SchemaError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Constraints {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Constraints>,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Field {
            name: name.into(),
            field_type,
            format: None,
            constraints: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.constraints = Some(Constraints { required: true });
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn is_required(&self) -> bool {
        self.constraints.as_ref().is_some_and(|c| c.required)
    }

    /// The effective format, `default` when none was declared.
    pub fn format(&self) -> &str {
        self.format.as_deref().unwrap_or("default")
    }
}

fn default_missing_values() -> Vec<String> {
    vec![String::new()]
}

fn is_default_missing_values(values: &[String]) -> bool {
    values.len() == 1 && values[0].is_empty()
}

/// Ordered field list of a table. Field order is the column order of every row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Descriptor {
    pub fields: Vec<Field>,
    #[serde(
        rename = "missingValues",
        default = "default_missing_values",
        skip_serializing_if = "is_default_missing_values"
    )]
    pub missing_values: Vec<String>,
}

impl Descriptor {
    pub fn new(fields: Vec<Field>) -> Self {
        Descriptor {
            fields,
            missing_values: default_missing_values(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, SchemaError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json(json: serde_json::Value) -> Result<Self, SchemaError> {
        Ok(serde_json::from_value(json)?)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn is_missing(&self, raw: &str) -> bool {
        self.missing_values.iter().any(|m| m == raw)
    }

    /// Checks internal consistency: at least one field, non-empty unique
    /// names and formats the field types understand.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.fields.is_empty() {
            return Err(SchemaError::InvalidDescriptor(
                "descriptor must declare at least one field".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(self.fields.len());
        for (index, field) in self.fields.iter().enumerate() {
            if field.name.trim().is_empty() {
                return Err(SchemaError::InvalidDescriptor(format!(
                    "field at position {index} has an empty name"
                )));
            }

            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField(field.name.clone()));
            }

            if let Some(format) = &field.format
                && !field.field_type.accepts_format(format)
            {
                return Err(SchemaError::InvalidFormat {
                    field: field.name.clone(),
                    field_type: field.field_type,
                    format: format.clone(),
                });
            }
        }

        Ok(())
    }
}
