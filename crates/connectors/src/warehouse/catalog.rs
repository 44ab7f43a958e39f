use crate::warehouse::descriptor::{FallbackSet, fallback_positions};
use model::schema::descriptor::Descriptor;
use std::collections::HashMap;

/// A bucket's descriptor together with the fallback positions derived from
/// it. The two are always replaced together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketState {
    pub descriptor: Descriptor,
    pub fallbacks: FallbackSet,
}

impl BucketState {
    pub fn from_descriptor(descriptor: Descriptor) -> Self {
        let fallbacks = fallback_positions(&descriptor);
        Self {
            descriptor,
            fallbacks,
        }
    }
}

/// Cached view of the dataset: the bucket list (lazily refreshed) and the
/// per-bucket descriptor state.
#[derive(Debug, Default)]
pub struct Catalog {
    buckets: Option<Vec<String>>,
    states: HashMap<String, BucketState>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops the cached bucket list; the next listing goes to the warehouse.
    pub fn invalidate(&mut self) {
        self.buckets = None;
    }

    pub fn cached(&self) -> Option<&[String]> {
        self.buckets.as_deref()
    }

    pub fn set(&mut self, buckets: Vec<String>) -> &[String] {
        self.buckets.insert(buckets)
    }

    /// Records a newly created bucket in the cached list, if there is one.
    pub fn remember(&mut self, bucket: &str) {
        if let Some(buckets) = self.buckets.as_mut()
            && !buckets.iter().any(|b| b == bucket)
        {
            buckets.push(bucket.to_string());
        }
    }

    pub fn forget(&mut self, bucket: &str) {
        if let Some(buckets) = self.buckets.as_mut() {
            buckets.retain(|b| b != bucket);
        }
        self.states.remove(bucket);
    }

    pub fn state(&self, bucket: &str) -> Option<&BucketState> {
        self.states.get(bucket)
    }

    pub fn insert(&mut self, bucket: &str, descriptor: Descriptor) -> &BucketState {
        self.states.insert(bucket.to_string(), BucketState::from_descriptor(descriptor));
        &self.states[bucket]
    }
}
