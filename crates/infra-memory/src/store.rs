// In-Memory Object Store Adapter
// Bucket-aware, unlike the core test mock: fetching or writing
// against a bucket that was never ensured is a backend error, which
// catches wiring mistakes in composition roots.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use chorus_core::port::object_store::{ObjectStore, ObjectStoreError};

#[derive(Default)]
pub struct MemoryObjectStore {
    buckets: Mutex<HashSet<String>>,
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_bucket(&self, bucket: &str) -> Result<(), ObjectStoreError> {
        if self.buckets.lock().unwrap().contains(bucket) {
            Ok(())
        } else {
            Err(ObjectStoreError::Backend(format!(
                "bucket '{bucket}' does not exist"
            )))
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
        self.check_bucket(bucket)?;
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| ObjectStoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    async fn write(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<(), ObjectStoreError> {
        self.check_bucket(bucket)?;
        debug!(bucket = %bucket, key = %key, bytes = bytes.len(), "Writing object");
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), bytes);
        Ok(())
    }

    async fn ensure_bucket(&self, bucket: &str) -> Result<(), ObjectStoreError> {
        let mut buckets = self.buckets.lock().unwrap();
        if buckets.insert(bucket.to_string()) {
            debug!(bucket = %bucket, "Bucket created");
        }
        Ok(())
    }
}
