use std::fmt;

use serde::{Deserialize, Serialize};

/// Status written when review answers arrive without an explicit status.
pub const DEFAULT_REVIEW_STATUS: &str = "generating presentation";

/// The statuses a caller may set directly, in the order they are reported
/// back on rejection.
pub const DEFAULT_ALLOWED_STATUSES: &[&str] = &[
    "uploading",
    "processing",
    "action needed",
    "refining",
    "ready",
    "complete",
    "done",
    "failed",
    "retry",
    "ready for download",
];

/// Statuses the client poller treats as "results are ready".
pub const DEFAULT_COMPLETED_STATUSES: &[&str] = &["completed", "complete"];

/// Ordered, duplicate-free set of status strings.
///
/// Statuses are plain strings rather than an enum: the downstream workflow
/// writes values of its own (`"generating presentation"`) and the set is
/// configurable per deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct StatusSet(Vec<String>);

impl StatusSet {
    pub fn new<I, S>(statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set: Vec<String> = Vec::new();
        for status in statuses {
            let status = status.into();
            if !set.contains(&status) {
                set.push(status);
            }
        }
        Self(set)
    }

    /// Exact, case-sensitive membership.
    pub fn contains(&self, status: &str) -> bool {
        self.0.iter().any(|s| s == status)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.clone()
    }

    pub fn default_allowed() -> Self {
        Self::new(DEFAULT_ALLOWED_STATUSES.iter().copied())
    }

    pub fn default_completed() -> Self {
        Self::new(DEFAULT_COMPLETED_STATUSES.iter().copied())
    }
}

impl From<Vec<String>> for StatusSet {
    fn from(statuses: Vec<String>) -> Self {
        Self::new(statuses)
    }
}

impl From<StatusSet> for Vec<String> {
    fn from(set: StatusSet) -> Self {
        set.0
    }
}

impl fmt::Display for StatusSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(", "))
    }
}
