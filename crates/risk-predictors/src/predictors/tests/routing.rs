use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, Request, StatusCode};
use tower::ServiceExt;

use super::common::*;

use crate::predictors::domain::ScoringRequest;
use crate::predictors::router::{assess_handler, history_handler, AssessQuery};
use crate::predictors::{predictor_router, PredictorService};

fn assess_request(uri: &str, body: &ScoringRequest) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body).expect("serialize request")))
        .expect("request builds")
}

#[tokio::test]
async fn assess_route_returns_all_families() {
    let (service, repository) = build_service(full_artifact(), PathBuf::from("unused.json"));
    let router = predictor_router(Arc::new(service));

    let response = router
        .oneshot(assess_request(
            "/api/v1/risks/predictors/all",
            &request(answers()),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["allReoffendingPredictor"]["staticOrDynamic"], "DYNAMIC");
    assert_eq!(payload["allReoffendingPredictor"]["band"], "VERY_HIGH");
    assert!(payload["directContactSexualReoffendingPredictor"]["score"].is_null());
    assert_eq!(payload["modelVersion"], "test-full-1");
    assert_eq!(repository.len(), 0);
}

#[tokio::test]
async fn final_flag_persists_and_history_returns_it() {
    let (service, repository) = build_service(full_artifact(), PathBuf::from("unused.json"));
    let router = predictor_router(Arc::new(service));

    let response = router
        .clone()
        .oneshot(assess_request(
            "/api/v1/risks/predictors/all?final=true",
            &request(answers()),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(repository.len(), 1);

    let response = router
        .oneshot(
            Request::get("/api/v1/risks/predictors/X123456/history")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    let records = payload.as_array().expect("array of records");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["subjectId"], "X123456");
    assert!(records[0]["createdAt"].is_string());
}

#[tokio::test]
async fn malformed_body_is_rejected() {
    let (service, _) = build_service(full_artifact(), PathBuf::from("unused.json"));
    let router = predictor_router(Arc::new(service));

    let response = router
        .oneshot(
            Request::post("/api/v1/risks/predictors/all")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"answers": {"subjectId": "X1"}}"#))
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    let message = payload["error"].as_str().expect("error message");
    assert!(!message.is_empty());
}

#[tokio::test]
async fn non_json_body_gets_structured_error() {
    let (service, _) = build_service(full_artifact(), PathBuf::from("unused.json"));
    let router = predictor_router(Arc::new(service));

    let response = router
        .oneshot(
            Request::post("/api/v1/risks/predictors/all")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("not json"))
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = read_json_body(response).await;
    assert!(payload["error"].is_string());
}

#[tokio::test]
async fn reload_failure_reports_active_version() {
    let (service, _) = build_service(
        full_artifact(),
        PathBuf::from("/nonexistent/predictors.json"),
    );
    let router = predictor_router(Arc::new(service));

    let response = router
        .oneshot(
            Request::post("/api/v1/risks/predictors/model/reload")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    assert_eq!(payload["modelVersion"], "test-full-1");
    assert!(payload["error"].is_string());
}

#[tokio::test]
async fn assess_handler_returns_unavailable_when_history_offline() {
    let service = Arc::new(PredictorService::new(
        Arc::new(engine(full_artifact())),
        Arc::new(UnavailableHistory),
        PathBuf::from("unused.json"),
    ));

    let response = assess_handler::<UnavailableHistory>(
        State(service),
        Query(AssessQuery { persist: true }),
        Ok(axum::Json(request(answers()))),
    )
    .await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn history_handler_returns_empty_list_for_unknown_subject() {
    let (service, _) = build_service(full_artifact(), PathBuf::from("unused.json"));

    let response = history_handler::<MemoryHistory>(
        State(Arc::new(service)),
        axum::extract::Path("unknown".to_string()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload, serde_json::json!([]));
}
