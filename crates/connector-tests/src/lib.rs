use connectors::{
    config::StorageConfig,
    warehouse::{job::JobPollPolicy, storage::Storage},
};
use fake::FakeWarehouse;
use std::sync::Arc;

pub mod fake;
pub mod storage;

pub const TEST_PROJECT: &str = "project";
pub const TEST_DATASET: &str = "dataset";

pub fn test_config(prefix: &str) -> StorageConfig {
    StorageConfig::new(TEST_PROJECT, TEST_DATASET)
        .with_prefix(prefix)
        .with_poll(JobPollPolicy::immediate())
}

/// A storage over `warehouse` that polls without sleeping.
pub fn test_storage(warehouse: &Arc<FakeWarehouse>, prefix: &str) -> Storage {
    Storage::new(warehouse.clone(), test_config(prefix)).expect("valid test config")
}
