//! HTTP client for the `/projects` surface, as used by the poller and the CLI.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;

use crate::poller::RecordSource;
use crate::project::ProjectRecord;
use crate::wire::{UpdateRequest, UpdateResponse};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("server returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

pub struct ProjectsClient {
    client: Client,
    base_url: String,
    user_id: String,
}

impl ProjectsClient {
    pub fn new(base_url: impl Into<String>, user_id: impl Into<String>) -> Result<Self, ClientError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user_id: user_id.into(),
        })
    }

    fn project_url(&self, project_id: &str) -> String {
        format!("{}/projects/{project_id}", self.base_url)
    }

    pub async fn fetch(&self, project_id: &str) -> Result<ProjectRecord, ClientError> {
        let response = self
            .client
            .get(self.project_url(project_id))
            .header("x-user-id", &self.user_id)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    pub async fn submit(
        &self,
        project_id: &str,
        request: &UpdateRequest,
    ) -> Result<UpdateResponse, ClientError> {
        let response = self
            .client
            .post(self.project_url(project_id))
            .header("x-user-id", &self.user_id)
            .json(request)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl RecordSource for ProjectsClient {
    type Error = ClientError;

    async fn fetch_record(&self, project_id: &str) -> Result<ProjectRecord, ClientError> {
        self.fetch(project_id).await
    }
}
