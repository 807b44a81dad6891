use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    StorageError,
    job::{JobRecord, JobStore},
};

/// Job store without persistence. Triggers registered through it do not
/// survive a restart; meant for tests and throwaway runs.
#[derive(Default)]
pub struct InMemoryJobStore {
    records: RwLock<HashMap<String, JobRecord>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn upsert(&self, record: JobRecord) -> Result<(), StorageError> {
        self.records
            .write()
            .await
            .insert(record.trigger_id.clone(), record);
        Ok(())
    }

    async fn remove(&self, trigger_id: &str) -> Result<bool, StorageError> {
        Ok(self.records.write().await.remove(trigger_id).is_some())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.records.write().await.clear();
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<JobRecord>, StorageError> {
        Ok(self.records.read().await.values().cloned().collect())
    }
}
