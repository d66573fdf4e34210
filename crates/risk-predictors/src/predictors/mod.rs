//! Predictor scoring pipeline: encode answers, run the model heads, pick a
//! candidate per family, then classify it into a risk band.

pub mod aggregate;
pub mod bands;
pub mod domain;
pub mod encoder;
pub mod engine;
pub mod model;
pub mod repository;
pub mod router;
pub mod scoring_config;
pub mod selector;
pub mod service;

#[cfg(test)]
pub(crate) mod tests;

pub use aggregate::CancelToken;
pub use bands::{BandTable, BandTables, ClassificationError, Threshold};
pub use domain::{
    AggregateResult, AnswerSet, CurrentOffences, DiagnosticKind, DynamicFactors,
    EmploymentStatus, FamilyDiagnostic, FamilyScoreCandidate, Gender, OffenceCode,
    PrecomputedScores, PredictorFamily, PredictorResult, PreviousOffences, ProblemLevel,
    RiskBand, ScoreType, ScoringRequest, SexualOffenceHistory, SubjectId,
};
pub use encoder::{encode, FeatureVector, ValidationError};
pub use engine::{EngineError, PredictorEngine};
pub use model::{InferenceError, ModelArtifact, ModelLoadError, ModelStore, ScoringModel};
pub use repository::{PredictorHistoryRepository, PredictorRecord, RepositoryError};
pub use router::predictor_router;
pub use scoring_config::{ScoringConfig, ScoringConfigError};
pub use selector::{ConfigurationError, PriorityOrder, PriorityTable};
pub use service::{PredictorService, PredictorServiceError};
