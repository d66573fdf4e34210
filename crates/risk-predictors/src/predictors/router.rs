use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{ScoringRequest, SubjectId};
use super::repository::{PredictorHistoryRepository, RepositoryError};
use super::service::{PredictorService, PredictorServiceError};

/// Router builder exposing the assessment, history, and reload endpoints.
pub fn predictor_router<R>(service: Arc<PredictorService<R>>) -> Router
where
    R: PredictorHistoryRepository + 'static,
{
    Router::new()
        .route("/api/v1/risks/predictors/all", post(assess_handler::<R>))
        .route(
            "/api/v1/risks/predictors/:subject_id/history",
            get(history_handler::<R>),
        )
        .route(
            "/api/v1/risks/predictors/model/reload",
            post(reload_handler::<R>),
        )
        .with_state(service)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AssessQuery {
    /// Final assessments are stored in the history repository.
    #[serde(default, rename = "final")]
    pub(crate) persist: bool,
}

pub(crate) async fn assess_handler<R>(
    State(service): State<Arc<PredictorService<R>>>,
    Query(query): Query<AssessQuery>,
    payload: Result<axum::Json<ScoringRequest>, JsonRejection>,
) -> Response
where
    R: PredictorHistoryRepository + 'static,
{
    let request = match payload {
        Ok(axum::Json(request)) => request,
        Err(rejection) => {
            let payload = json!({ "error": rejection.body_text() });
            return (rejection.status(), axum::Json(payload)).into_response();
        }
    };
    match service.assess(request, query.persist).await {
        Ok(result) => (StatusCode::OK, axum::Json(result)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn history_handler<R>(
    State(service): State<Arc<PredictorService<R>>>,
    Path(subject_id): Path<String>,
) -> Response
where
    R: PredictorHistoryRepository + 'static,
{
    match service.history(&SubjectId(subject_id)) {
        Ok(records) => (StatusCode::OK, axum::Json(records)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn reload_handler<R>(State(service): State<Arc<PredictorService<R>>>) -> Response
where
    R: PredictorHistoryRepository + 'static,
{
    match service.reload_model().await {
        Ok(version) => {
            let payload = json!({ "modelVersion": version });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(PredictorServiceError::Engine(error)) => {
            let payload = json!({
                "error": error.to_string(),
                "modelVersion": service.engine().model_version(),
            });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        Err(other) => error_response(other),
    }
}

fn error_response(error: PredictorServiceError) -> Response {
    let status = match error {
        PredictorServiceError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        PredictorServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}
