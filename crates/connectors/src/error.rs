use crate::warehouse::native::JobHandle;
use model::error::SchemaError;
use std::time::Duration;
use thiserror::Error;

/// Failures reported by a warehouse client implementation.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The referenced table or job does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A table with the same name already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// The warehouse rejected or failed the request.
    #[error("Request failed: {0}")]
    Request(String),

    /// Low-level transport failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// All errors surfaced by the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A field or column type has no mapping on the other side.
    #[error("Type {0} is not supported")]
    UnsupportedType(String),

    /// `create` without `force` on a bucket that already exists.
    #[error("Bucket \"{0}\" already exists")]
    BucketExists(String),

    /// The bucket is not present in the dataset.
    #[error("Bucket \"{0}\" doesn't exist")]
    BucketNotFound(String),

    /// Two fields map to the same column name after sanitization.
    #[error("Fields \"{first}\" and \"{second}\" both map to column \"{column}\"")]
    DuplicateColumn {
        first: String,
        second: String,
        column: String,
    },

    /// The load job finished with errors (one message per line).
    #[error("{0}")]
    LoadJob(String),

    /// The load job did not reach a terminal state before the poll deadline.
    #[error("Load job {job} did not finish within {elapsed:?}")]
    LoadJobTimeout { job: JobHandle, elapsed: Duration },

    /// Descriptor validation or value casting failed.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Rows could not be encoded for loading.
    #[error("Encoding error: {0}")]
    Encoding(#[from] csv::Error),

    /// Invalid storage configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A warehouse call failed; propagated without retry.
    #[error("Warehouse client error: {0}")]
    Client(#[from] ClientError),
}
