use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::ScoringPaths;

use super::aggregate::{Aggregator, CancelToken};
use super::bands::ClassificationError;
use super::domain::{AggregateResult, PredictorFamily, ScoreType, ScoringRequest};
use super::encoder::{FEATURE_LEN, STATIC_LEN};
use super::model::{ModelLoadError, ModelStore, ScoringModel};
use super::scoring_config::{ScoringConfig, ScoringConfigError, ScoringConfigInvalid};
use super::selector::ConfigurationError;

/// Startup failure of the scoring engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    ModelLoad(#[from] ModelLoadError),
    #[error(transparent)]
    ScoringConfig(#[from] ScoringConfigError),
    #[error(transparent)]
    Classification(#[from] ClassificationError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl From<ScoringConfigInvalid> for EngineError {
    fn from(value: ScoringConfigInvalid) -> Self {
        match value {
            ScoringConfigInvalid::Classification(err) => EngineError::Classification(err),
            ScoringConfigInvalid::Configuration(err) => EngineError::Configuration(err),
        }
    }
}

/// Entry point for assessments. Shared across requests as `Arc<PredictorEngine>`.
#[derive(Debug)]
pub struct PredictorEngine {
    models: ModelStore,
    config: ScoringConfig,
}

impl PredictorEngine {
    /// Validates the scoring config before accepting any request.
    pub fn new(models: ModelStore, config: ScoringConfig) -> Result<Self, EngineError> {
        config.validate()?;
        warn_on_unexpected_widths(&models.current());
        Ok(Self { models, config })
    }

    pub fn from_paths(paths: &ScoringPaths) -> Result<Self, EngineError> {
        let models = ModelStore::load(&paths.model_path)?;
        let config = match &paths.scoring_config {
            Some(path) => {
                let config = ScoringConfig::load(path)?;
                info!(path = %path.display(), "scoring config loaded");
                config
            }
            None => ScoringConfig::default(),
        };
        Self::new(models, config)
    }

    pub fn model_version(&self) -> String {
        self.models.current().version().to_string()
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Swaps in a new artifact. Requests already running keep the old model.
    pub fn reload_model(&self, path: impl AsRef<Path>) -> Result<Arc<ScoringModel>, EngineError> {
        let model = self.models.reload(path)?;
        warn_on_unexpected_widths(&model);
        Ok(model)
    }

    pub fn assess(&self, request: &ScoringRequest) -> AggregateResult {
        self.assess_with_cancel(request, &CancelToken::new())
    }

    pub fn assess_with_cancel(
        &self,
        request: &ScoringRequest,
        cancel: &CancelToken,
    ) -> AggregateResult {
        let model = self.models.current();
        Aggregator::new(&model, &self.config.bands, &self.config.priorities)
            .aggregate(request, cancel)
    }
}

fn warn_on_unexpected_widths(model: &ScoringModel) {
    for family in PredictorFamily::MODELLED {
        for (variant, expected) in [(ScoreType::Static, STATIC_LEN), (ScoreType::Dynamic, FEATURE_LEN)] {
            if let Some(declared) = model.input_len(family, variant) {
                if declared != expected {
                    warn!(
                        %family,
                        variant = variant.label(),
                        declared,
                        expected,
                        version = model.version(),
                        "model head width differs from encoder output"
                    );
                }
            }
        }
    }
}
