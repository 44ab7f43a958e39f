use crate::{
    config::StorageConfig,
    error::{ClientError, StorageError},
    warehouse::{
        catalog::{BucketState, Catalog},
        client::WarehouseClient,
        codec::{convert_row, restore_row, sort_rows},
        descriptor::{convert_descriptor, restore_descriptor},
        encoder::CsvLoadEncoder,
        job::{JobPollPolicy, wait_for_job},
        mapper::Mapper,
        native::{DatasetRef, LoadFormat, NativeRow, NativeTable},
    },
};
use model::{records::row::Row, schema::descriptor::Descriptor};
use std::{fmt, sync::Arc};
use tracing::{debug, info};

/// Outcome of a [`Storage::write`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteReport {
    /// Rows loaded.
    pub rows: usize,
    /// Load jobs submitted, one per chunk.
    pub jobs: usize,
}

/// Buckets (tables) of one warehouse dataset, mapped to and from abstract
/// descriptors.
///
/// Every operation takes `&mut self` and awaits its warehouse calls one at a
/// time, so a storage is never used by two tasks at once and a write never
/// has more than one load job in flight.
pub struct Storage {
    client: Arc<dyn WarehouseClient>,
    dataset: DatasetRef,
    mapper: Mapper,
    catalog: Catalog,
    chunk_size: usize,
    poll: JobPollPolicy,
    encoder: CsvLoadEncoder,
}

impl Storage {
    pub fn new(
        client: Arc<dyn WarehouseClient>,
        config: StorageConfig,
    ) -> Result<Self, StorageError> {
        config.validate()?;

        Ok(Self {
            client,
            dataset: config.dataset_ref(),
            mapper: Mapper::new(config.prefix),
            catalog: Catalog::new(),
            chunk_size: config.chunk_size,
            poll: config.poll,
            encoder: CsvLoadEncoder::new(),
        })
    }

    pub fn dataset(&self) -> &DatasetRef {
        &self.dataset
    }

    pub fn mapper(&self) -> &Mapper {
        &self.mapper
    }

    /// Buckets in the dataset that carry this storage's prefix. Listed once
    /// and cached until the next create or delete.
    pub async fn buckets(&mut self) -> Result<&[String], StorageError> {
        if self.catalog.cached().is_none() {
            let tables = self.client.list_tables(&self.dataset).await?;
            let buckets = tables
                .iter()
                .filter_map(|table| self.mapper.restore_bucket(table))
                .collect();
            self.catalog.set(buckets);
        }

        Ok(self.catalog.cached().unwrap_or_default())
    }

    pub async fn check(&mut self, bucket: &str) -> Result<bool, StorageError> {
        Ok(self.buckets().await?.iter().any(|b| b == bucket))
    }

    /// Creates a table for `bucket`. With `force`, an existing table is
    /// dropped first.
    pub async fn create(
        &mut self,
        bucket: &str,
        descriptor: Descriptor,
        force: bool,
    ) -> Result<(), StorageError> {
        self.create_many([(bucket, descriptor)], force).await
    }

    /// Creates several tables in order. Every descriptor is validated before
    /// the first warehouse call; past that point a failure leaves the earlier
    /// buckets created.
    pub async fn create_many<S: Into<String>>(
        &mut self,
        pairs: impl IntoIterator<Item = (S, Descriptor)>,
        force: bool,
    ) -> Result<(), StorageError> {
        let mut prepared = Vec::new();
        for (bucket, descriptor) in pairs {
            descriptor.validate()?;
            let (schema, _) = convert_descriptor(&descriptor)?;
            let bucket: String = bucket.into();
            prepared.push((bucket, descriptor, schema));
        }

        let mut result = Ok(());
        for (bucket, descriptor, schema) in prepared {
            let table = NativeTable {
                name: self.mapper.convert_bucket(&bucket),
                schema,
            };
            if let Err(err) = self.create_table(&bucket, descriptor, table, force).await {
                result = Err(err);
                break;
            }
        }

        self.catalog.invalidate();
        result
    }

    async fn create_table(
        &mut self,
        bucket: &str,
        descriptor: Descriptor,
        table: NativeTable,
        force: bool,
    ) -> Result<(), StorageError> {
        if self.check(bucket).await? {
            if !force {
                return Err(StorageError::BucketExists(bucket.to_string()));
            }
            self.drop_table(bucket).await?;
        }

        let table_name = table.name.clone();
        self.client
            .insert_table(&self.dataset, table)
            .await
            .map_err(|err| match err {
                ClientError::AlreadyExists(_) => StorageError::BucketExists(bucket.to_string()),
                other => other.into(),
            })?;

        info!("Created table {table_name} for bucket {bucket} in {}", self.dataset);
        self.catalog.insert(bucket, descriptor);
        self.catalog.remember(bucket);
        Ok(())
    }

    pub async fn delete(&mut self, bucket: &str, ignore: bool) -> Result<(), StorageError> {
        self.delete_many([bucket], ignore).await
    }

    /// Deletes buckets in order. A missing bucket is an error unless
    /// `ignore` is set, in which case it is skipped.
    pub async fn delete_many<S: AsRef<str>>(
        &mut self,
        buckets: impl IntoIterator<Item = S>,
        ignore: bool,
    ) -> Result<(), StorageError> {
        let mut deleted = false;
        let mut result = Ok(());

        for bucket in buckets {
            let bucket = bucket.as_ref();
            match self.check(bucket).await {
                Ok(true) => {}
                Ok(false) if ignore => continue,
                Ok(false) => {
                    result = Err(StorageError::BucketNotFound(bucket.to_string()));
                    break;
                }
                Err(err) => {
                    result = Err(err);
                    break;
                }
            }

            if let Err(err) = self.drop_table(bucket).await {
                result = Err(err);
                break;
            }
            deleted = true;
        }

        if deleted {
            self.catalog.invalidate();
        }
        result
    }

    /// Deletes every bucket of this storage, most recently listed first.
    pub async fn delete_all(&mut self, ignore: bool) -> Result<(), StorageError> {
        let buckets: Vec<String> = self.buckets().await?.iter().rev().cloned().collect();
        self.delete_many(buckets, ignore).await
    }

    async fn drop_table(&mut self, bucket: &str) -> Result<(), StorageError> {
        let table_name = self.mapper.convert_bucket(bucket);
        self.client
            .delete_table(&self.dataset, &table_name)
            .await
            .map_err(not_found(bucket))?;

        info!("Deleted table {table_name} for bucket {bucket} in {}", self.dataset);
        self.catalog.forget(bucket);
        Ok(())
    }

    /// Returns the bucket's descriptor. A given `descriptor` replaces the
    /// cached one without touching the table; otherwise the cached one is
    /// returned, or restored from the table's native schema on first use.
    pub async fn describe(
        &mut self,
        bucket: &str,
        descriptor: Option<Descriptor>,
    ) -> Result<Descriptor, StorageError> {
        Ok(self.bucket_state(bucket, descriptor).await?.descriptor.clone())
    }

    async fn bucket_state(
        &mut self,
        bucket: &str,
        descriptor: Option<Descriptor>,
    ) -> Result<&BucketState, StorageError> {
        if let Some(descriptor) = descriptor {
            descriptor.validate()?;
            return Ok(self.catalog.insert(bucket, descriptor));
        }

        if self.catalog.state(bucket).is_none() {
            let table_name = self.mapper.convert_bucket(bucket);
            let table = self
                .client
                .get_table(&self.dataset, &table_name)
                .await
                .map_err(not_found(bucket))?;
            let restored = restore_descriptor(&table.schema)?;
            debug!("Restored descriptor of bucket {bucket} from table {table_name}");
            self.catalog.insert(bucket, restored);
        }

        self.catalog
            .state(bucket)
            .ok_or_else(|| StorageError::BucketNotFound(bucket.to_string()))
    }

    /// Fetches the bucket's rows, sorted by their first column, and restores
    /// them one at a time as the iterator advances.
    pub async fn iter(&mut self, bucket: &str) -> Result<RowIter, StorageError> {
        self.ensure_exists(bucket).await?;
        let descriptor = self.describe(bucket, None).await?;

        let table_name = self.mapper.convert_bucket(bucket);
        let mut rows = self
            .client
            .list_rows(&self.dataset, &table_name)
            .await
            .map_err(not_found(bucket))?;
        sort_rows(&mut rows);

        Ok(RowIter {
            rows: rows.into_iter(),
            descriptor,
        })
    }

    pub async fn read(&mut self, bucket: &str) -> Result<Vec<Row>, StorageError> {
        self.iter(bucket).await?.collect()
    }

    /// Loads `rows` into the bucket in chunks, one load job per chunk. Each
    /// job must finish before the next chunk is submitted. A failed job does
    /// not undo the chunks loaded before it.
    pub async fn write(
        &mut self,
        bucket: &str,
        rows: impl IntoIterator<Item = Row>,
    ) -> Result<WriteReport, StorageError> {
        self.ensure_exists(bucket).await?;
        let state = self.bucket_state(bucket, None).await?.clone();
        let table_name = self.mapper.convert_bucket(bucket);

        let mut report = WriteReport::default();
        let mut chunk = Vec::with_capacity(self.chunk_size);

        for row in rows {
            chunk.push(convert_row(row, &state.descriptor, &state.fallbacks)?);
            if chunk.len() == self.chunk_size {
                self.load_chunk(&table_name, &chunk).await?;
                report.rows += chunk.len();
                report.jobs += 1;
                chunk.clear();
            }
        }

        if !chunk.is_empty() {
            self.load_chunk(&table_name, &chunk).await?;
            report.rows += chunk.len();
            report.jobs += 1;
        }

        info!(
            "Wrote {} row(s) to bucket {bucket} in {} job(s)",
            report.rows, report.jobs
        );
        Ok(report)
    }

    async fn load_chunk(&self, table_name: &str, chunk: &[Row]) -> Result<(), StorageError> {
        let payload = self.encoder.encode_rows(chunk)?;
        debug!(
            "Submitting load job for {} row(s) ({} bytes) into {table_name}",
            chunk.len(),
            payload.len()
        );

        let job = self
            .client
            .submit_load_job(&self.dataset, table_name, payload, LoadFormat::Csv)
            .await?;
        debug!("Load job {job} submitted");

        wait_for_job(self.client.as_ref(), &job, &self.poll).await
    }

    async fn ensure_exists(&mut self, bucket: &str) -> Result<(), StorageError> {
        if self.check(bucket).await? {
            Ok(())
        } else {
            Err(StorageError::BucketNotFound(bucket.to_string()))
        }
    }
}

impl fmt::Display for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Storage <{}>", self.dataset)
    }
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage")
            .field("dataset", &self.dataset)
            .field("prefix", &self.mapper.prefix())
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}

/// Restores fetched rows lazily. A row that fails to restore is yielded as
/// an error; iteration can continue past it.
#[derive(Debug)]
pub struct RowIter {
    rows: std::vec::IntoIter<NativeRow>,
    descriptor: Descriptor,
}

impl Iterator for RowIter {
    type Item = Result<Row, StorageError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows
            .next()
            .map(|row| restore_row(row, &self.descriptor))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

fn not_found(bucket: &str) -> impl FnOnce(ClientError) -> StorageError + '_ {
    move |err| match err {
        ClientError::NotFound(_) => StorageError::BucketNotFound(bucket.to_string()),
        other => other.into(),
    }
}
