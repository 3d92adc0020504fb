//! JSON-file backed [`ProjectStore`].
//!
//! The whole table is held in memory and rewritten on every mutation
//! (temp file + rename). Good enough for a single-node deployment or a demo;
//! the write lock is held across the rewrite so mutations are serialized.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{ProjectStore, StoreError};
use crate::project::{ProjectKey, ProjectRecord, RecordPatch};

pub struct JsonFileStore {
    path: PathBuf,
    records: RwLock<BTreeMap<ProjectKey, ProjectRecord>>,
}

impl JsonFileStore {
    /// Open the store at `path`, starting empty if the file does not exist.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let records = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice::<Vec<ProjectRecord>>(&bytes)?
                .into_iter()
                .map(|r| (r.key(), r))
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    async fn persist(&self, records: &BTreeMap<ProjectKey, ProjectRecord>) -> Result<(), StoreError> {
        let snapshot: Vec<&ProjectRecord> = records.values().collect();
        let bytes = serde_json::to_vec_pretty(&snapshot)?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl ProjectStore for JsonFileStore {
    async fn get(&self, key: &ProjectKey) -> Result<Option<ProjectRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records.get(key).cloned())
    }

    async fn put(&self, record: ProjectRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let key = record.key();
        let previous = records.insert(key.clone(), record);
        if let Err(e) = self.persist(&records).await {
            match previous {
                Some(prev) => records.insert(key, prev),
                None => records.remove(&key),
            };
            return Err(e);
        }
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
        let previous = record.clone();
        record.apply(patch, Utc::now().timestamp_millis());
        let written = record.clone();

        if let Err(e) = self.persist(&records).await {
            records.insert(key.clone(), previous);
            return Err(e);
        }
        Ok(written)
    }
}
