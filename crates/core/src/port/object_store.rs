// Object Storage Port (Interface)
// Thin boundary over the artifact store. Keys are bucket-relative
// storage keys as validated by the message schemas.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ObjectStoreError {
    #[error("object '{key}' not found in bucket '{bucket}'")]
    NotFound { bucket: String, key: String },

    #[error("storage backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch the full contents of an object
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Vec<u8>, ObjectStoreError>;

    /// Write an object, overwriting any previous version
    async fn write(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<(), ObjectStoreError>;

    /// Create the bucket if it does not exist (idempotent)
    async fn ensure_bucket(&self, bucket: &str) -> Result<(), ObjectStoreError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Hash-map object store for unit tests (no bucket bookkeeping)
    #[derive(Default)]
    pub struct MockObjectStore {
        objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    }

    impl MockObjectStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_object(bucket: &str, key: &str, bytes: impl Into<Vec<u8>>) -> Self {
            let store = Self::default();
            store
                .objects
                .lock()
                .unwrap()
                .insert((bucket.to_string(), key.to_string()), bytes.into());
            store
        }

        pub fn contains(&self, bucket: &str, key: &str) -> bool {
            self.objects
                .lock()
                .unwrap()
                .contains_key(&(bucket.to_string(), key.to_string()))
        }
    }

    #[async_trait]
    impl ObjectStore for MockObjectStore {
        async fn fetch(&self, bucket: &str, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
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

        async fn write(
            &self,
            bucket: &str,
            key: &str,
            bytes: Vec<u8>,
        ) -> Result<(), ObjectStoreError> {
            self.objects
                .lock()
                .unwrap()
                .insert((bucket.to_string(), key.to_string()), bytes);
            Ok(())
        }

        async fn ensure_bucket(&self, _bucket: &str) -> Result<(), ObjectStoreError> {
            Ok(())
        }
    }
}
