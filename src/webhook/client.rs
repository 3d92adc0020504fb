use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::RecordForwarder;
use super::error::WebhookError;
use crate::project::ProjectRecord;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Posts project records as JSON to a workflow webhook.
#[derive(Clone)]
pub struct WebhookClient {
    client: Client,
}

impl WebhookClient {
    pub fn new() -> Result<Self, WebhookError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, WebhookError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl RecordForwarder for WebhookClient {
    async fn forward(&self, url: &str, record: &ProjectRecord) -> Result<(), WebhookError> {
        debug!(url, project_id = %record.project_id, "forwarding record to webhook");
        let response = self.client.post(url).json(record).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WebhookError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}
