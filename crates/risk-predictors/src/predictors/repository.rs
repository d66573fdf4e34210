use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{AggregateResult, SubjectId};

/// Persisted assessment, keyed by subject and creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictorRecord {
    pub subject_id: SubjectId,
    pub created_at: DateTime<Utc>,
    pub result: AggregateResult,
}

/// Storage abstraction so the service can be exercised without a database.
pub trait PredictorHistoryRepository: Send + Sync {
    fn save(&self, record: PredictorRecord) -> Result<PredictorRecord, RepositoryError>;
    /// Records for a subject, oldest first.
    fn history(&self, subject_id: &SubjectId) -> Result<Vec<PredictorRecord>, RepositoryError>;
    fn latest(&self, subject_id: &SubjectId) -> Result<Option<PredictorRecord>, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
