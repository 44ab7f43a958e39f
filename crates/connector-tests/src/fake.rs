use async_trait::async_trait;
use bytes::Bytes;
use connectors::{
    error::ClientError,
    warehouse::{
        client::WarehouseClient,
        native::{
            DatasetRef, JobHandle, JobStatus, LoadFormat, Mode, NativeRow, NativeSchema,
            NativeTable, NativeType,
        },
    },
};
use std::{
    collections::{HashMap, VecDeque},
    sync::{Mutex, MutexGuard, PoisonError},
};

struct FakeTable {
    dataset: DatasetRef,
    name: String,
    schema: NativeSchema,
    rows: Vec<NativeRow>,
}

struct FakeJob {
    dataset: DatasetRef,
    table: String,
    rows: Vec<NativeRow>,
    pending_polls: usize,
    errors: Vec<String>,
    applied: bool,
}

#[derive(Default)]
struct State {
    tables: Vec<FakeTable>,
    jobs: HashMap<String, FakeJob>,
    submitted: Vec<usize>,
    polls: usize,
    pending_polls: usize,
    scripted_errors: VecDeque<Vec<String>>,
}

impl State {
    fn table(&self, dataset: &DatasetRef, name: &str) -> Option<&FakeTable> {
        self.tables
            .iter()
            .find(|t| &t.dataset == dataset && t.name == name)
    }

    fn table_mut(&mut self, dataset: &DatasetRef, name: &str) -> Option<&mut FakeTable> {
        self.tables
            .iter_mut()
            .find(|t| &t.dataset == dataset && t.name == name)
    }
}

/// In-memory warehouse. Load payloads are parsed as CSV and checked against
/// the table schema the way a real load job would, and rows only become
/// visible once the job is polled to completion.
#[derive(Default)]
pub struct FakeWarehouse {
    state: Mutex<State>,
}

impl FakeWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every job submitted from now on reports `Running` this many times
    /// before it is done.
    pub fn set_pending_polls(&self, polls: usize) {
        self.lock().pending_polls = polls;
    }

    /// The next submitted job finishes with these errors.
    pub fn fail_next_job(&self, errors: &[&str]) {
        self.lock()
            .scripted_errors
            .push_back(errors.iter().map(|e| e.to_string()).collect());
    }

    /// Creates a table directly, bypassing any storage.
    pub fn put_table(&self, dataset: &DatasetRef, table: NativeTable) {
        self.lock().tables.push(FakeTable {
            dataset: dataset.clone(),
            name: table.name,
            schema: table.schema,
            rows: Vec::new(),
        });
    }

    pub fn table_names(&self, dataset: &DatasetRef) -> Vec<String> {
        self.lock()
            .tables
            .iter()
            .filter(|t| &t.dataset == dataset)
            .map(|t| t.name.clone())
            .collect()
    }

    pub fn schema(&self, dataset: &DatasetRef, table: &str) -> Option<NativeSchema> {
        self.lock().table(dataset, table).map(|t| t.schema.clone())
    }

    pub fn stored_rows(&self, dataset: &DatasetRef, table: &str) -> Vec<NativeRow> {
        self.lock()
            .table(dataset, table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Row count of every submitted load job, in submission order.
    pub fn load_jobs(&self) -> Vec<usize> {
        self.lock().submitted.clone()
    }

    pub fn polls(&self) -> usize {
        self.lock().polls
    }
}

fn parse_payload(source: &[u8]) -> Result<Vec<NativeRow>, ClientError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(source);

    reader
        .records()
        .map(|record| {
            let record = record.map_err(|e| ClientError::Request(e.to_string()))?;
            Ok(record
                .iter()
                .map(|cell| (!cell.is_empty()).then(|| cell.to_string()))
                .collect())
        })
        .collect()
}

/// Checks loaded cells against the schema and normalizes them to the text the
/// warehouse hands back when listing rows.
fn check_rows(schema: &NativeSchema, rows: &mut [NativeRow]) -> Vec<String> {
    let mut errors = Vec::new();

    for (line, row) in rows.iter_mut().enumerate() {
        if row.len() != schema.fields.len() {
            errors.push(format!(
                "Row {} has {} columns, expected {}",
                line + 1,
                row.len(),
                schema.fields.len()
            ));
            continue;
        }

        for (field, cell) in schema.fields.iter().zip(row.iter_mut()) {
            let Some(text) = cell.as_mut() else {
                if field.mode == Mode::Required {
                    errors.push(format!("Missing required field: {}", field.name));
                }
                continue;
            };

            let valid = match field.field_type {
                NativeType::Integer => text.parse::<i64>().is_ok(),
                NativeType::Float => text.parse::<f64>().is_ok(),
                NativeType::Boolean => matches!(text.as_str(), "true" | "false"),
                NativeType::Date => chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok(),
                NativeType::Datetime => {
                    let parsed =
                        chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f");
                    if let Ok(datetime) = parsed {
                        *text = datetime.format("%Y-%m-%dT%H:%M:%S%.f").to_string();
                    }
                    parsed.is_ok()
                }
                _ => true,
            };

            if !valid {
                errors.push(format!(
                    "Could not parse '{text}' as {} for field {}",
                    field.field_type, field.name
                ));
            }
        }
    }

    errors
}

#[async_trait]
impl WarehouseClient for FakeWarehouse {
    async fn list_tables(&self, dataset: &DatasetRef) -> Result<Vec<String>, ClientError> {
        Ok(self.table_names(dataset))
    }

    async fn insert_table(
        &self,
        dataset: &DatasetRef,
        table: NativeTable,
    ) -> Result<(), ClientError> {
        if self.lock().table(dataset, &table.name).is_some() {
            return Err(ClientError::AlreadyExists(table.name));
        }
        self.put_table(dataset, table);
        Ok(())
    }

    async fn delete_table(&self, dataset: &DatasetRef, table: &str) -> Result<(), ClientError> {
        let mut state = self.lock();
        let before = state.tables.len();
        state
            .tables
            .retain(|t| !(&t.dataset == dataset && t.name == table));

        if state.tables.len() == before {
            return Err(ClientError::NotFound(table.to_string()));
        }
        Ok(())
    }

    async fn get_table(
        &self,
        dataset: &DatasetRef,
        table: &str,
    ) -> Result<NativeTable, ClientError> {
        self.lock()
            .table(dataset, table)
            .map(|t| NativeTable {
                name: t.name.clone(),
                schema: t.schema.clone(),
            })
            .ok_or_else(|| ClientError::NotFound(table.to_string()))
    }

    async fn list_rows(
        &self,
        dataset: &DatasetRef,
        table: &str,
    ) -> Result<Vec<NativeRow>, ClientError> {
        let state = self.lock();
        let table = state
            .table(dataset, table)
            .ok_or_else(|| ClientError::NotFound(table.to_string()))?;

        // Listing order is unspecified; rows come back in load order.
        Ok(table.rows.clone())
    }

    async fn submit_load_job(
        &self,
        dataset: &DatasetRef,
        table: &str,
        source: Bytes,
        format: LoadFormat,
    ) -> Result<JobHandle, ClientError> {
        if format != LoadFormat::Csv {
            return Err(ClientError::Request(format!("Unsupported format {format:?}")));
        }

        let mut rows = parse_payload(&source)?;
        let mut state = self.lock();
        let schema = state
            .table(dataset, table)
            .map(|t| t.schema.clone())
            .ok_or_else(|| ClientError::NotFound(table.to_string()))?;

        let mut errors = check_rows(&schema, &mut rows);
        if let Some(scripted) = state.scripted_errors.pop_front() {
            errors.extend(scripted);
        }

        let job_id = format!("job_{}", state.submitted.len() + 1);
        state.submitted.push(rows.len());
        let pending_polls = state.pending_polls;
        state.jobs.insert(
            job_id.clone(),
            FakeJob {
                dataset: dataset.clone(),
                table: table.to_string(),
                rows,
                pending_polls,
                errors,
                applied: false,
            },
        );

        Ok(JobHandle {
            project: dataset.project.clone(),
            job_id,
        })
    }

    async fn poll_job(&self, job: &JobHandle) -> Result<JobStatus, ClientError> {
        let mut state = self.lock();
        state.polls += 1;

        let fake = state
            .jobs
            .get_mut(&job.job_id)
            .ok_or_else(|| ClientError::NotFound(job.to_string()))?;

        if fake.pending_polls > 0 {
            fake.pending_polls -= 1;
            return Ok(JobStatus::running());
        }

        let errors = fake.errors.clone();
        let load = if fake.applied || !errors.is_empty() {
            None
        } else {
            fake.applied = true;
            Some((
                fake.dataset.clone(),
                fake.table.clone(),
                std::mem::take(&mut fake.rows),
            ))
        };

        if let Some((dataset, table, rows)) = load {
            let target = state
                .table_mut(&dataset, &table)
                .ok_or_else(|| ClientError::NotFound(table.clone()))?;
            target.rows.extend(rows);
        }

        Ok(JobStatus::done(errors))
    }
}
