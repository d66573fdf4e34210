use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryPredictorHistoryRepository};
use crate::routes::with_predictor_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use risk_predictors::config::AppConfig;
use risk_predictors::error::AppError;
use risk_predictors::predictors::{PredictorEngine, PredictorService};
use risk_predictors::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    // A model or scoring config that fails to load aborts startup.
    let engine = Arc::new(PredictorEngine::from_paths(&config.scoring)?);
    let repository = Arc::new(InMemoryPredictorHistoryRepository::default());
    let predictor_service = Arc::new(PredictorService::new(
        engine.clone(),
        repository,
        config.scoring.model_path.clone(),
    ));

    let app = with_predictor_routes(predictor_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        model_version = %engine.model_version(),
        "risk predictor service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
