use chrono::Utc;
use clap::Args;
use risk_predictors::config::{AppConfig, ScoringPaths};
use risk_predictors::error::AppError;
use risk_predictors::predictors::{
    AnswerSet, PrecomputedScores, PredictorEngine, ScoringRequest,
};
use risk_predictors::telemetry::{self, LogSink};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::path::{Path, PathBuf};

#[derive(Args, Debug, Default)]
pub(crate) struct ModelArgs {
    /// Model artifact to load instead of APP_MODEL_PATH
    #[arg(long)]
    pub(crate) model: Option<PathBuf>,
    /// Scoring config to load instead of APP_SCORING_CONFIG
    #[arg(long)]
    pub(crate) scoring_config: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// JSON file holding the assessment answers
    #[arg(long)]
    pub(crate) answers: PathBuf,
    /// JSON file holding upstream candidates for the precomputed families
    #[arg(long)]
    pub(crate) precomputed: Option<PathBuf>,
    #[command(flatten)]
    pub(crate) model: ModelArgs,
}

#[derive(Args, Debug, Default)]
pub(crate) struct CheckArgs {
    #[command(flatten)]
    pub(crate) model: ModelArgs,
}

pub(crate) fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let paths = prepare(&args.model)?;
    let engine = PredictorEngine::from_paths(&paths)?;

    let answers: AnswerSet = read_json(&args.answers)?;
    let precomputed = match &args.precomputed {
        Some(path) => read_json::<PrecomputedScores>(path)?,
        None => PrecomputedScores::default(),
    };

    let result = engine.assess(&ScoringRequest {
        answers,
        precomputed,
    });
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

pub(crate) fn run_check(args: CheckArgs) -> Result<(), AppError> {
    let paths = prepare(&args.model)?;
    let engine = PredictorEngine::from_paths(&paths)?;

    let report = json!({
        "status": "ready",
        "modelVersion": engine.model_version(),
        "modelPath": paths.model_path.display().to_string(),
        "scoringConfig": paths
            .scoring_config
            .as_ref()
            .map(|path| path.display().to_string()),
        "checkedAt": Utc::now().to_rfc3339(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Loads config and routes logs to stderr, keeping stdout for the JSON output.
fn prepare(args: &ModelArgs) -> Result<ScoringPaths, AppError> {
    let config = AppConfig::load()?;
    telemetry::init_with_sink(&config.telemetry, LogSink::Stderr)?;
    Ok(with_overrides(config.scoring, args))
}

fn with_overrides(mut paths: ScoringPaths, args: &ModelArgs) -> ScoringPaths {
    if let Some(model) = &args.model {
        paths.model_path = model.clone();
    }
    if let Some(scoring_config) = &args.scoring_config {
        paths.scoring_config = Some(scoring_config.clone());
    }
    paths
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}
