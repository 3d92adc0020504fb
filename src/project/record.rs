use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Composite key of a project record: one user owns many projects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectKey {
    pub user_id: String,
    pub project_id: String,
}

impl ProjectKey {
    pub fn new(user_id: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            project_id: project_id.into(),
        }
    }
}

impl std::fmt::Display for ProjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "USER#{}/PROJ#{}", self.user_id, self.project_id)
    }
}

/// A follow-up prompt shown to the user after the first generation pass.
///
/// Only `id`, `type` and `label` are typed. Every other attribute
/// (`options`, `required`, `userAnswer`, ...) stays raw JSON in `extra`, so
/// the question is stored and forwarded downstream exactly as the client
/// sent it, whatever shape those attributes have.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewQuestion {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub label: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ReviewQuestion {
    pub fn new(id: impl Into<String>, kind: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            label: label.into(),
            extra: Map::new(),
        }
    }

    /// The answer, if it is a string.
    pub fn user_answer(&self) -> Option<&str> {
        self.extra.get("userAnswer").and_then(Value::as_str)
    }

    /// `true` only for a literal JSON `true`.
    pub fn required(&self) -> bool {
        self.extra
            .get("required")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// String options, in order. Non-string entries are skipped.
    pub fn options(&self) -> Vec<&str> {
        self.extra
            .get("options")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// A missing, non-string, blank or whitespace-only answer counts as
    /// unanswered.
    pub fn is_answered(&self) -> bool {
        self.user_answer()
            .is_some_and(|answer| !answer.trim().is_empty())
    }
}

/// The persisted per-project state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    pub user_id: String,
    pub project_id: String,
    pub status: String,
    #[serde(default)]
    pub review_and_refine: Vec<ReviewQuestion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds, strictly increasing across mutations.
    pub updated_at: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProjectRecord {
    pub fn new(key: &ProjectKey, status: impl Into<String>) -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            user_id: key.user_id.clone(),
            project_id: key.project_id.clone(),
            status: status.into(),
            review_and_refine: Vec::new(),
            download_url: None,
            created_at: now,
            updated_at: now,
            extra: Map::new(),
        }
    }

    pub fn key(&self) -> ProjectKey {
        ProjectKey::new(self.user_id.clone(), self.project_id.clone())
    }

    /// Questions the user still has to answer, in display order.
    pub fn unanswered(&self) -> impl Iterator<Item = &ReviewQuestion> {
        self.review_and_refine.iter().filter(|q| !q.is_answered())
    }

    /// Apply a patch in place. `updated_at` always moves forward, even when
    /// the wall clock has not.
    pub fn apply(&mut self, patch: &RecordPatch, now_ms: i64) {
        self.updated_at = now_ms.max(self.updated_at + 1);
        if let Some(questions) = &patch.review_and_refine {
            self.review_and_refine = questions.clone();
        }
        if let Some(status) = &patch.status {
            self.status = status.clone();
        }
    }
}

/// Fields one conditional update sets. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPatch {
    pub review_and_refine: Option<Vec<ReviewQuestion>>,
    pub status: Option<String>,
}
