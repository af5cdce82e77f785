use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{UploadError, UploadResult};
use crate::types::StoredObject;

/// Persistence record tracking a stored object. Created only after the
/// backend acknowledged completion; never created for an aborted session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    pub bucket: String,
    pub key: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

impl FileRecord {
    /// Mint a record for a freshly stored object
    pub fn for_object(object: &StoredObject) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            bucket: object.bucket.clone(),
            key: object.key.clone(),
            size_bytes: object.size_bytes,
            created_at: Utc::now(),
        }
    }
}

/// Storage for file records. The surrounding application supplies its own
/// database-backed implementation.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn create(&self, record: FileRecord) -> UploadResult<FileRecord>;

    async fn get(&self, id: &str) -> UploadResult<Option<FileRecord>>;
}

/// In-process record store for tests and demos
#[derive(Default)]
pub struct MemoryRecordStore {
    records: Mutex<HashMap<String, FileRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, FileRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn create(&self, record: FileRecord) -> UploadResult<FileRecord> {
        let mut records = self.lock();
        if records.contains_key(&record.id) {
            return Err(UploadError::record(format!(
                "record {} already exists",
                record.id
            )));
        }
        records.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn get(&self, id: &str) -> UploadResult<Option<FileRecord>> {
        Ok(self.lock().get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = MemoryRecordStore::new();
        let object = StoredObject {
            bucket: "media".into(),
            key: "a/b".into(),
            size_bytes: 42,
            parts: 1,
            record_id: None,
        };

        let record = store.create(FileRecord::for_object(&object)).await.unwrap();
        let fetched = store.get(&record.id).await.unwrap().unwrap();
        assert_eq!(fetched.key, "a/b");
        assert_eq!(fetched.size_bytes, 42);
        assert!(store.get("missing").await.unwrap().is_none());
    }
}
