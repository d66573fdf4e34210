use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::aggregate::CancelToken;
use super::domain::{AggregateResult, ScoringRequest, SubjectId};
use super::engine::{EngineError, PredictorEngine};
use super::repository::{PredictorHistoryRepository, PredictorRecord, RepositoryError};

/// Service composing the scoring engine with assessment history storage.
pub struct PredictorService<R> {
    engine: Arc<PredictorEngine>,
    repository: Arc<R>,
    model_path: PathBuf,
}

/// Cancels the scoring run when the awaiting request goes away.
struct CancelOnDrop(CancelToken);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

impl<R> PredictorService<R>
where
    R: PredictorHistoryRepository + 'static,
{
    /// `model_path` is the artifact re-read by [`PredictorService::reload_model`].
    pub fn new(engine: Arc<PredictorEngine>, repository: Arc<R>, model_path: PathBuf) -> Self {
        Self {
            engine,
            repository,
            model_path,
        }
    }

    pub fn engine(&self) -> &Arc<PredictorEngine> {
        &self.engine
    }

    /// Score a request off the async runtime and store it when `persist` is set.
    pub async fn assess(
        &self,
        request: ScoringRequest,
        persist: bool,
    ) -> Result<AggregateResult, PredictorServiceError> {
        let token = CancelToken::new();
        let _guard = CancelOnDrop(token.clone());
        let engine = Arc::clone(&self.engine);
        let subject_id = request.answers.subject_id.clone();

        let result = tokio::task::spawn_blocking(move || engine.assess_with_cancel(&request, &token))
            .await
            .map_err(|err| PredictorServiceError::Task(err.to_string()))?;

        if persist {
            let record = self.repository.save(PredictorRecord {
                subject_id,
                created_at: Utc::now(),
                result: result.clone(),
            })?;
            info!(
                subject = %record.subject_id,
                created_at = %record.created_at,
                version = %record.result.model_version,
                "assessment stored"
            );
        }

        Ok(result)
    }

    pub fn history(
        &self,
        subject_id: &SubjectId,
    ) -> Result<Vec<PredictorRecord>, PredictorServiceError> {
        Ok(self.repository.history(subject_id)?)
    }

    /// Re-reads the configured artifact and returns the now active version.
    pub async fn reload_model(&self) -> Result<String, PredictorServiceError> {
        let engine = Arc::clone(&self.engine);
        let path = self.model_path.clone();
        let model = tokio::task::spawn_blocking(move || engine.reload_model(path))
            .await
            .map_err(|err| PredictorServiceError::Task(err.to_string()))??;
        Ok(model.version().to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PredictorServiceError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("scoring task failed: {0}")]
    Task(String),
}
