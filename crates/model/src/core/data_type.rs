use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt};

/// Type tag of a table-schema field.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    String,
    Integer,
    Number,
    Boolean,
    Date,
    Time,
    Datetime,
    Year,
    Yearmonth,
    Duration,
    Array,
    Object,
    Geojson,
    Geopoint,
    Any,
}

lazy_static! {
    static ref FIELD_TYPE_MAP: HashMap<&'static str, FieldType> = build_field_type_map();
}

impl FieldType {
    pub const ALL: [FieldType; 15] = [
        FieldType::String,
        FieldType::Integer,
        FieldType::Number,
        FieldType::Boolean,
        FieldType::Date,
        FieldType::Time,
        FieldType::Datetime,
        FieldType::Year,
        FieldType::Yearmonth,
        FieldType::Duration,
        FieldType::Array,
        FieldType::Object,
        FieldType::Geojson,
        FieldType::Geopoint,
        FieldType::Any,
    ];

    pub fn from_name(type_name: &str) -> Result<Self, String> {
        FIELD_TYPE_MAP
            .get(type_name.trim().to_lowercase().as_str())
            .copied()
            .ok_or_else(|| format!("Unknown field type: {type_name}"))
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Time => "time",
            FieldType::Datetime => "datetime",
            FieldType::Year => "year",
            FieldType::Yearmonth => "yearmonth",
            FieldType::Duration => "duration",
            FieldType::Array => "array",
            FieldType::Object => "object",
            FieldType::Geojson => "geojson",
            FieldType::Geopoint => "geopoint",
            FieldType::Any => "any",
        }
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, FieldType::Date | FieldType::Time | FieldType::Datetime)
    }

    /// Whether `format` is one this type understands.
    pub fn accepts_format(&self, format: &str) -> bool {
        match self {
            FieldType::Date | FieldType::Time | FieldType::Datetime => {
                matches!(format, "default" | "any")
                    || format.contains('%')
                    || format.strip_prefix("fmt:").is_some_and(|f| f.contains('%'))
            }
            FieldType::String => {
                matches!(format, "default" | "email" | "uri" | "binary" | "uuid")
            }
            FieldType::Geopoint => matches!(format, "default" | "array" | "object"),
            FieldType::Geojson => matches!(format, "default" | "topojson"),
            _ => format == "default",
        }
    }
}

impl TryFrom<&str> for FieldType {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        FieldType::from_name(s)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn build_field_type_map() -> HashMap<&'static str, FieldType> {
    FieldType::ALL
        .iter()
        .map(|field_type| (field_type.name(), *field_type))
        .collect()
}
