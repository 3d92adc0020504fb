//! JSON bodies exchanged on `/projects/{projectId}`.

use serde::{Deserialize, Serialize};

use crate::gate::UpdateOutcome;
use crate::project::ReviewQuestion;

/// Body of a `PUT`/`POST` to `/projects/{projectId}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_and_refine: Option<Vec<ReviewQuestion>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedFields {
    pub review_and_refine: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// `200` body of an accepted update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResponse {
    pub ok: bool,
    pub project_id: String,
    pub updated: UpdatedFields,
    pub forwarded_to_n8n: bool,
    pub method: String,
}

impl UpdateResponse {
    pub fn from_outcome(outcome: UpdateOutcome, method: impl Into<String>) -> Self {
        Self {
            ok: true,
            project_id: outcome.project_id,
            updated: UpdatedFields {
                review_and_refine: outcome.review_updated,
                status: outcome.status,
            },
            forwarded_to_n8n: outcome.forwarded,
            method: method.into(),
        }
    }
}
