mod record;
mod status;

pub use record::{ProjectKey, ProjectRecord, RecordPatch, ReviewQuestion};
pub use status::{
    DEFAULT_ALLOWED_STATUSES, DEFAULT_COMPLETED_STATUSES, DEFAULT_REVIEW_STATUS, StatusSet,
};
