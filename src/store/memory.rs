//! In-memory implementation of [`ProjectStore`]. All state is lost on restart.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{ProjectStore, StoreError};
use crate::project::{ProjectKey, ProjectRecord, RecordPatch};

#[derive(Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<ProjectKey, ProjectRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with `records`.
    pub fn with_records(records: impl IntoIterator<Item = ProjectRecord>) -> Self {
        let records = records.into_iter().map(|r| (r.key(), r)).collect();
        Self {
            records: RwLock::new(records),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl ProjectStore for InMemoryStore {
    async fn get(&self, key: &ProjectKey) -> Result<Option<ProjectRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records.get(key).cloned())
    }

    async fn put(&self, record: ProjectRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        records.insert(record.key(), record);
        Ok(())
    }

    async fn update_existing(
        &self,
        key: &ProjectKey,
        patch: &RecordPatch,
    ) -> Result<ProjectRecord, StoreError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(key)
            .ok_or_else(|| StoreError::ConditionFailed(key.clone()))?;
        record.apply(patch, Utc::now().timestamp_millis());
        Ok(record.clone())
    }
}
