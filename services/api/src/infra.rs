use metrics_exporter_prometheus::PrometheusHandle;
use risk_predictors::predictors::{
    PredictorHistoryRepository, PredictorRecord, RepositoryError, SubjectId,
};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Process-local assessment history; lost on restart.
#[derive(Default, Clone)]
pub(crate) struct InMemoryPredictorHistoryRepository {
    records: Arc<Mutex<HashMap<SubjectId, Vec<PredictorRecord>>>>,
}

impl InMemoryPredictorHistoryRepository {
    fn records(
        &self,
    ) -> Result<MutexGuard<'_, HashMap<SubjectId, Vec<PredictorRecord>>>, RepositoryError> {
        self.records
            .lock()
            .map_err(|_| RepositoryError::Unavailable("history store poisoned".to_string()))
    }
}

impl PredictorHistoryRepository for InMemoryPredictorHistoryRepository {
    fn save(&self, record: PredictorRecord) -> Result<PredictorRecord, RepositoryError> {
        let mut guard = self.records()?;
        let history = guard.entry(record.subject_id.clone()).or_default();
        if history
            .iter()
            .any(|existing| existing.created_at == record.created_at)
        {
            return Err(RepositoryError::Conflict);
        }
        history.push(record.clone());
        history.sort_by_key(|stored| stored.created_at);
        Ok(record)
    }

    fn history(&self, subject_id: &SubjectId) -> Result<Vec<PredictorRecord>, RepositoryError> {
        let guard = self.records()?;
        Ok(guard.get(subject_id).cloned().unwrap_or_default())
    }

    fn latest(&self, subject_id: &SubjectId) -> Result<Option<PredictorRecord>, RepositoryError> {
        let guard = self.records()?;
        Ok(guard
            .get(subject_id)
            .and_then(|history| history.last())
            .cloned())
    }
}
