use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt};

/// Column type in the warehouse's own vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NativeType {
    String,
    Integer,
    Float,
    Boolean,
    Date,
    Time,
    Datetime,
    Timestamp,
    Numeric,
    BigNumeric,
    Bytes,
    Record,
    Geography,
    Json,
    Custom(String),
}

lazy_static! {
    static ref NATIVE_TYPE_MAP: HashMap<&'static str, NativeType> = build_native_type_map();
}

impl NativeType {
    /// Resolves a type name, accepting the legacy aliases (`INT64`, `BOOL`, ...).
    pub fn from_name(type_name: &str) -> Self {
        let normalized = type_name.trim().to_uppercase();
        NATIVE_TYPE_MAP
            .get(normalized.as_str())
            .cloned()
            .unwrap_or(NativeType::Custom(normalized))
    }

    pub fn name(&self) -> &str {
        match self {
            NativeType::String => "STRING",
            NativeType::Integer => "INTEGER",
            NativeType::Float => "FLOAT",
            NativeType::Boolean => "BOOLEAN",
            NativeType::Date => "DATE",
            NativeType::Time => "TIME",
            NativeType::Datetime => "DATETIME",
            NativeType::Timestamp => "TIMESTAMP",
            NativeType::Numeric => "NUMERIC",
            NativeType::BigNumeric => "BIGNUMERIC",
            NativeType::Bytes => "BYTES",
            NativeType::Record => "RECORD",
            NativeType::Geography => "GEOGRAPHY",
            NativeType::Json => "JSON",
            NativeType::Custom(name) => name,
        }
    }
}

impl From<String> for NativeType {
    fn from(s: String) -> Self {
        NativeType::from_name(&s)
    }
}

impl From<NativeType> for String {
    fn from(t: NativeType) -> Self {
        t.name().to_string()
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn build_native_type_map() -> HashMap<&'static str, NativeType> {
    use NativeType::*;

    let entries = [
        ("STRING", String),
        ("INTEGER", Integer),
        ("INT64", Integer),
        ("FLOAT", Float),
        ("FLOAT64", Float),
        ("BOOLEAN", Boolean),
        ("BOOL", Boolean),
        ("DATE", Date),
        ("TIME", Time),
        ("DATETIME", Datetime),
        ("TIMESTAMP", Timestamp),
        ("NUMERIC", Numeric),
        ("BIGNUMERIC", BigNumeric),
        ("BYTES", Bytes),
        ("RECORD", Record),
        ("STRUCT", Record),
        ("GEOGRAPHY", Geography),
        ("JSON", Json),
    ];

    let mut map = HashMap::new();
    for (name, native_type) in entries {
        map.insert(name, native_type);
    }
    map
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Mode {
    #[default]
    Nullable,
    Required,
    Repeated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: NativeType,
    #[serde(default)]
    pub mode: Mode,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeSchema {
    pub fields: Vec<NativeField>,
}

/// Table body sent to `insert_table` and returned by `get_table`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeTable {
    pub name: String,
    pub schema: NativeSchema,
}

/// Project and dataset that every table call is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetRef {
    pub project: String,
    pub dataset: String,
}

impl DatasetRef {
    pub fn new(project: impl Into<String>, dataset: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            dataset: dataset.into(),
        }
    }
}

impl fmt::Display for DatasetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.project, self.dataset)
    }
}

/// A row as returned by `list_rows`: every cell is text or null.
pub type NativeRow = Vec<Option<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LoadFormat {
    Csv,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobHandle {
    pub project: String,
    pub job_id: String,
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.project, self.job_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobState {
    Pending,
    Running,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    pub state: JobState,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl JobStatus {
    pub fn running() -> Self {
        Self {
            state: JobState::Running,
            errors: Vec::new(),
        }
    }

    pub fn done(errors: Vec<String>) -> Self {
        Self {
            state: JobState::Done,
            errors,
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == JobState::Done
    }
}
