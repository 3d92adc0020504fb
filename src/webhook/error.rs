//! Errors raised while forwarding a record to the workflow webhook.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WebhookError {
    /// The webhook answered with a non-2xx status. `body` is the raw
    /// response text, empty if it could not be read.
    #[error("webhook rejected the record (status {status}): {body}")]
    Rejected { status: u16, body: String },

    /// The request never produced a response (DNS, refused connection, timeout).
    #[error("webhook network error: {0}")]
    Network(#[from] reqwest::Error),
}
