use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use super::bands::{BandTables, ClassificationError};
use super::domain::{
    AggregateResult, DiagnosticKind, FamilyDiagnostic, FamilyScoreCandidate, PredictorFamily,
    PredictorResult, ScoreType, ScoringRequest,
};
use super::encoder::{self, FeatureVector, ValidationError};
use super::model::{InferenceError, ScoringModel};
use super::selector::{self, ConfigurationError, PriorityTable};

/// Cooperative cancellation flag shared between a request and its scoring run.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
enum FamilyError {
    Validation(ValidationError),
    Inference(InferenceError),
    Inconsistent(String),
    Classification(ClassificationError),
    Configuration(ConfigurationError),
}

impl From<ValidationError> for FamilyError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<InferenceError> for FamilyError {
    fn from(value: InferenceError) -> Self {
        Self::Inference(value)
    }
}

impl From<ClassificationError> for FamilyError {
    fn from(value: ClassificationError) -> Self {
        Self::Classification(value)
    }
}

impl From<ConfigurationError> for FamilyError {
    fn from(value: ConfigurationError) -> Self {
        Self::Configuration(value)
    }
}

impl FamilyError {
    fn into_diagnostic(self, family: PredictorFamily) -> FamilyDiagnostic {
        let (kind, field, message) = match self {
            FamilyError::Validation(err) => {
                (DiagnosticKind::Validation, Some(err.field.clone()), err.to_string())
            }
            FamilyError::Inference(err) => (DiagnosticKind::Inference, None, err.to_string()),
            FamilyError::Inconsistent(message) => {
                (DiagnosticKind::InconsistentInput, None, message)
            }
            FamilyError::Classification(err) => {
                (DiagnosticKind::Configuration, None, err.to_string())
            }
            FamilyError::Configuration(err) => {
                (DiagnosticKind::Configuration, None, err.to_string())
            }
        };
        FamilyDiagnostic {
            family,
            kind,
            field,
            message,
        }
    }
}

/// Composes per-family results against one model snapshot.
pub(crate) struct Aggregator<'a> {
    model: &'a ScoringModel,
    bands: &'a BandTables,
    priorities: &'a PriorityTable,
}

impl<'a> Aggregator<'a> {
    pub(crate) fn new(
        model: &'a ScoringModel,
        bands: &'a BandTables,
        priorities: &'a PriorityTable,
    ) -> Self {
        Self {
            model,
            bands,
            priorities,
        }
    }

    pub(crate) fn aggregate(&self, request: &ScoringRequest, cancel: &CancelToken) -> AggregateResult {
        let mut result = AggregateResult {
            model_version: self.model.version().to_string(),
            ..AggregateResult::default()
        };
        let encoded = encoder::encode(&request.answers);

        for family in PredictorFamily::ALL {
            if cancel.is_cancelled() {
                result.diagnostics.push(FamilyDiagnostic {
                    family,
                    kind: DiagnosticKind::Cancelled,
                    field: None,
                    message: "assessment abandoned before this family was scored".to_string(),
                });
                continue;
            }

            let outcome = if family.is_modelled() {
                self.score_modelled(family, &encoded, &mut result.diagnostics)
            } else {
                self.score_precomputed(family, request)
            };

            match outcome {
                Ok(predictor) => {
                    debug!(
                        subject = %request.answers.subject_id,
                        %family,
                        variant = ?predictor.static_or_dynamic,
                        band = ?predictor.band,
                        "family scored"
                    );
                    *result.predictor_mut(family) = predictor;
                }
                Err(err) => {
                    if let FamilyError::Inference(inference) = &err {
                        warn!(
                            subject = %request.answers.subject_id,
                            %family,
                            vector_len = encoded.as_ref().map(FeatureVector::len).unwrap_or(0),
                            error = %inference,
                            "inference failed"
                        );
                    } else {
                        debug!(%family, error = ?err, "family not scored");
                    }
                    result.diagnostics.push(err.into_diagnostic(family));
                }
            }
        }

        result
    }

    fn score_modelled(
        &self,
        family: PredictorFamily,
        encoded: &Result<FeatureVector, ValidationError>,
        diagnostics: &mut Vec<FamilyDiagnostic>,
    ) -> Result<PredictorResult, FamilyError> {
        let features = encoded.as_ref().map_err(|err| err.clone())?;
        let order = self.priorities.order(family)?;

        let mut candidates = Vec::with_capacity(2);
        for variant in [ScoreType::Dynamic, ScoreType::Static] {
            let candidate = match self.model.infer(family, variant, features)? {
                Some(raw) => {
                    if let Some(original) = raw.clamped_from {
                        warn!(
                            %family,
                            variant = variant.label(),
                            original,
                            clamped = raw.value,
                            "model output outside 0-100; clamped"
                        );
                        diagnostics.push(FamilyDiagnostic {
                            family,
                            kind: DiagnosticKind::ScoreClamped,
                            field: None,
                            message: format!(
                                "{} score {original} clamped to {}",
                                variant.label(),
                                raw.value
                            ),
                        });
                    }
                    FamilyScoreCandidate::calculated(Some(variant), raw.value)
                }
                None => FamilyScoreCandidate::not_calculated(Some(variant)),
            };
            candidates.push(candidate);
        }

        let selected = selector::select(order, &candidates);
        self.resolve(family, selected, &candidates)
    }

    fn score_precomputed(
        &self,
        family: PredictorFamily,
        request: &ScoringRequest,
    ) -> Result<PredictorResult, FamilyError> {
        if family.is_sexual() {
            encoder::validate_sexual_history(&request.answers)?;
        }
        let candidates = request.precomputed.for_family(family);
        let order = self.priorities.order(family)?;
        let selected = selector::select(order, candidates);
        if selected.is_none() && candidates.iter().any(|candidate| candidate.calculated) {
            return Err(FamilyError::Inconsistent(
                "calculated candidate has no variant matching the priority order".to_string(),
            ));
        }
        self.resolve(family, selected, candidates)
    }

    /// Converts the selected candidate into the public result, enforcing that
    /// a score and a band are either both present or both absent.
    fn resolve(
        &self,
        family: PredictorFamily,
        selected: Option<&FamilyScoreCandidate>,
        candidates: &[FamilyScoreCandidate],
    ) -> Result<PredictorResult, FamilyError> {
        let algorithm_version = if family == PredictorFamily::CombinedSeriousReoffending {
            selector::algorithm_version(selected, candidates).map(str::to_string)
        } else {
            None
        };

        let Some(candidate) = selected else {
            return Ok(PredictorResult {
                algorithm_version,
                ..PredictorResult::default()
            });
        };

        let score = match candidate.score {
            Some(score) if score.is_finite() && (0.0..=100.0).contains(&score) => score,
            Some(score) => {
                return Err(FamilyError::Inconsistent(format!(
                    "score {score} is outside 0-100"
                )))
            }
            None if candidate.band.is_some() => {
                return Err(FamilyError::Inconsistent(
                    "band supplied without a score".to_string(),
                ))
            }
            None => {
                return Err(FamilyError::Inconsistent(
                    "calculated candidate carries no score".to_string(),
                ))
            }
        };

        let band = match candidate.band {
            Some(band) => band,
            None => self.bands.classify(family, score)?,
        };

        Ok(PredictorResult {
            static_or_dynamic: candidate.variant,
            score: Some(score),
            band: Some(band),
            algorithm_version,
        })
    }
}
