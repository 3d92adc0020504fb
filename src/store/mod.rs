//! Record store abstraction.
//!
//! The gate only needs three primitives from its backing store: a
//! consistent read, an unconditional put (used by whatever creates
//! projects, and by tests), and a conditional update that refuses to
//! create records. Backends: [`InMemoryStore`] and [`JsonFileStore`].

mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::InMemoryStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::project::{ProjectKey, ProjectRecord, RecordPatch};

#[derive(Debug, Error)]
pub enum StoreError {
    /// The conditional update found no record for the key.
    #[error("no record for {0}")]
    ConditionFailed(ProjectKey),

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Strongly consistent read of a single record.
    async fn get(&self, key: &ProjectKey) -> Result<Option<ProjectRecord>, StoreError>;

    /// Insert or overwrite a record.
    async fn put(&self, record: ProjectRecord) -> Result<(), StoreError>;

    /// Apply `patch` to an existing record and return the record as written.
    ///
    /// Fails with [`StoreError::ConditionFailed`] and leaves the store
    /// untouched when no record exists for `key`.
    async fn update_existing(
        &self,
        key: &ProjectKey,
        patch: &RecordPatch,
    ) -> Result<ProjectRecord, StoreError>;
}
