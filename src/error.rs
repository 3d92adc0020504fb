use thiserror::Error;

use crate::store::StoreError;
use crate::webhook::WebhookError;

/// Everything the status gate can refuse or fail with.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("Missing userId (use an authenticated session or the X-User-Id header)")]
    MissingIdentity,

    #[error("Missing projectId path param")]
    MissingProjectId,

    #[error("Provide reviewAndRefine (array) and/or status (string)")]
    EmptyUpdate,

    #[error("Request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("Failed to read request body: {0}")]
    UnreadableBody(String),

    #[error("Each question in reviewAndRefine requires id, type, label")]
    MalformedQuestion { index: usize, reason: String },

    #[error("Invalid status '{status}'")]
    InvalidStatus { status: String, allowed: Vec<String> },

    #[error("Project not found")]
    NotFound,

    #[error("Project not found after update")]
    NotFoundAfterUpdate,

    #[error("Workflow webhook call failed")]
    Upstream { status: u16, body: String },

    #[error("Server misconfigured: {0}")]
    Misconfigured(String),

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("Webhook error: {0}")]
    Webhook(WebhookError),
}

impl GateError {
    /// HTTP status this error is surfaced as.
    pub fn status_code(&self) -> u16 {
        match self {
            GateError::MissingIdentity
            | GateError::MissingProjectId
            | GateError::EmptyUpdate
            | GateError::UnreadableBody(_) => 400,
            GateError::PayloadTooLarge { .. } => 413,
            GateError::NotFound | GateError::NotFoundAfterUpdate => 404,
            GateError::MalformedQuestion { .. } | GateError::InvalidStatus { .. } => 422,
            GateError::Upstream { .. } => 502,
            GateError::Misconfigured(_) | GateError::Store(_) | GateError::Webhook(_) => 500,
        }
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

impl From<StoreError> for GateError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ConditionFailed(_) => GateError::NotFound,
            other => GateError::Store(other),
        }
    }
}

impl From<WebhookError> for GateError {
    fn from(err: WebhookError) -> Self {
        match err {
            WebhookError::Rejected { status, body } => GateError::Upstream { status, body },
            other => GateError::Webhook(other),
        }
    }
}
