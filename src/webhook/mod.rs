pub mod client;
pub mod error;

pub use client::WebhookClient;
pub use error::WebhookError;

use async_trait::async_trait;

use crate::project::ProjectRecord;

/// Something that can hand an updated record to the downstream workflow.
#[async_trait]
pub trait RecordForwarder: Send + Sync {
    async fn forward(&self, url: &str, record: &ProjectRecord) -> Result<(), WebhookError>;
}
