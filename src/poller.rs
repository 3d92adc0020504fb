//! Client-side status polling.
//!
//! The poller re-reads a project record on a fixed interval and stops as soon
//! as the record asks for something: unanswered review questions, or a
//! completed status. Fetch failures are logged and retried on the next tick;
//! there is no backoff.

use std::fmt::Display;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::project::{ProjectRecord, ReviewQuestion, StatusSet};

/// Where the poller reads records from.
#[async_trait]
pub trait RecordSource: Send + Sync {
    type Error: Display + Send;

    async fn fetch_record(&self, project_id: &str) -> Result<ProjectRecord, Self::Error>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollDecision {
    /// The user must answer these before generation can continue.
    AnswerQuestions(Vec<ReviewQuestion>),
    /// Results are ready.
    Completed { download_url: Option<String> },
    KeepPolling,
}

/// Unanswered questions win over a completed status.
pub fn decide(record: &ProjectRecord, completed: &StatusSet) -> PollDecision {
    let unanswered: Vec<ReviewQuestion> = record.unanswered().cloned().collect();
    if !unanswered.is_empty() {
        return PollDecision::AnswerQuestions(unanswered);
    }
    if completed.contains(&record.status) {
        return PollDecision::Completed {
            download_url: record.download_url.clone(),
        };
    }
    PollDecision::KeepPolling
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "StatusSet::default_completed")]
    pub completed_statuses: StatusSet,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_interval_secs() -> u64 {
    5
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            interval_secs: default_interval_secs(),
            completed_statuses: StatusSet::default_completed(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PollError {
    #[error("no decision after {attempts} attempts")]
    GaveUp {
        attempts: u32,
        last_error: Option<String>,
    },
}

pub struct Poller<S> {
    source: S,
    interval: Duration,
    completed: StatusSet,
    max_attempts: Option<u32>,
}

impl<S: RecordSource> Poller<S> {
    pub fn new(source: S, interval: Duration, completed: StatusSet) -> Self {
        Self {
            source,
            interval: interval.max(Duration::from_millis(1)),
            completed,
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Poll until the record calls for action. The first fetch is immediate.
    pub async fn run(&self, project_id: &str) -> Result<PollDecision, PollError> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut attempts = 0u32;
        let mut last_error = None;
        loop {
            if let Some(max) = self.max_attempts
                && attempts >= max
            {
                return Err(PollError::GaveUp {
                    attempts,
                    last_error,
                });
            }
            ticker.tick().await;
            attempts += 1;

            match self.source.fetch_record(project_id).await {
                Ok(record) => match decide(&record, &self.completed) {
                    PollDecision::KeepPolling => {
                        debug!(project_id, status = %record.status, attempts, "still processing");
                    }
                    decision => {
                        info!(project_id, attempts, "poll finished");
                        return Ok(decision);
                    }
                },
                Err(e) => {
                    warn!(project_id, error = %e, "status check failed");
                    last_error = Some(e.to_string());
                }
            }
        }
    }
}
