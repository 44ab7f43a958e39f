use crate::{
    error::StorageError,
    warehouse::{job::JobPollPolicy, native::DatasetRef},
};
use serde::Deserialize;
use std::{collections::HashMap, str::FromStr};

pub const DEFAULT_CHUNK_SIZE: usize = 10_000;

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

/// Where a storage lives and how it loads data.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StorageConfig {
    pub project: String,
    pub dataset: String,
    /// Prepended to every bucket name to form the table name.
    #[serde(default)]
    pub prefix: String,
    /// Rows per load job.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default)]
    pub poll: JobPollPolicy,
}

impl StorageConfig {
    pub fn new(project: impl Into<String>, dataset: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            dataset: dataset.into(),
            prefix: String::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            poll: JobPollPolicy::default(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_poll(mut self, poll: JobPollPolicy) -> Self {
        self.poll = poll;
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self, StorageError> {
        let config: StorageConfig = serde_json::from_str(json)
            .map_err(|e| StorageError::Config(format!("Invalid storage config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `WAREHOUSE_*` variables from the process environment.
    pub fn from_env() -> Result<Self, StorageError> {
        Self::from_vars(&std::env::vars().collect())
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, StorageError> {
        let required = |key: &str| {
            vars.get(key)
                .filter(|v| !v.trim().is_empty())
                .cloned()
                .ok_or_else(|| StorageError::Config(format!("{key} is not set")))
        };

        let mut config = Self::new(required("WAREHOUSE_PROJECT")?, required("WAREHOUSE_DATASET")?);

        if let Some(prefix) = vars.get("WAREHOUSE_PREFIX") {
            config.prefix = prefix.clone();
        }
        if let Some(size) = parse_var::<usize>(vars, "WAREHOUSE_CHUNK_SIZE")? {
            config.chunk_size = size;
        }
        if let Some(interval) = parse_var::<u64>(vars, "WAREHOUSE_POLL_INTERVAL_MS")? {
            config.poll.base_delay_ms = interval;
            config.poll.max_delay_ms = interval;
        }
        if let Some(deadline) = parse_var::<u64>(vars, "WAREHOUSE_POLL_DEADLINE_MS")? {
            config.poll.deadline_ms = Some(deadline);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), StorageError> {
        if self.project.trim().is_empty() || self.dataset.trim().is_empty() {
            return Err(StorageError::Config(
                "Project and dataset must not be empty".to_string(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(StorageError::Config(
                "Chunk size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn dataset_ref(&self) -> DatasetRef {
        DatasetRef::new(&self.project, &self.dataset)
    }
}

fn parse_var<T: FromStr>(
    vars: &HashMap<String, String>,
    key: &str,
) -> Result<Option<T>, StorageError> {
    match vars.get(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| StorageError::Config(format!("{key} has an invalid value: {raw}"))),
    }
}
