use crate::{
    error::ClientError,
    warehouse::native::{DatasetRef, JobHandle, JobStatus, LoadFormat, NativeRow, NativeTable},
};
use async_trait::async_trait;
use bytes::Bytes;

/// The warehouse calls the storage layer depends on. Implementations own
/// transport, authentication and transient-error retries.
#[async_trait]
pub trait WarehouseClient: Send + Sync {
    async fn list_tables(&self, dataset: &DatasetRef) -> Result<Vec<String>, ClientError>;

    /// Fails if a table with the same name already exists.
    async fn insert_table(&self, dataset: &DatasetRef, table: NativeTable)
    -> Result<(), ClientError>;

    /// Fails if the table is absent.
    async fn delete_table(&self, dataset: &DatasetRef, table: &str) -> Result<(), ClientError>;

    /// Fails if the table is absent.
    async fn get_table(&self, dataset: &DatasetRef, table: &str)
    -> Result<NativeTable, ClientError>;

    /// Every row of the table, in no particular order.
    async fn list_rows(&self, dataset: &DatasetRef, table: &str)
    -> Result<Vec<NativeRow>, ClientError>;

    async fn submit_load_job(
        &self,
        dataset: &DatasetRef,
        table: &str,
        source: Bytes,
        format: LoadFormat,
    ) -> Result<JobHandle, ClientError>;

    async fn poll_job(&self, job: &JobHandle) -> Result<JobStatus, ClientError>;
}
