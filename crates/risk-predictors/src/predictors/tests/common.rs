use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::predictors::bands::{BandTable, Threshold};
use crate::predictors::domain::{
    AnswerSet, CurrentOffences, DynamicFactors, EmploymentStatus, FamilyScoreCandidate, Gender,
    OffenceCode, PrecomputedScores, PredictorFamily, PreviousOffences, ProblemLevel, RiskBand,
    ScoreType, ScoringRequest, SexualOffenceHistory, SubjectId,
};
use crate::predictors::encoder::{FEATURE_LEN, STATIC_LEN};
use crate::predictors::model::{
    HeadSpec, Layer, ModelArtifact, ModelStore, ScoringModel, ARTIFACT_FORMAT,
    ARTIFACT_FORMAT_VERSION,
};
use crate::predictors::repository::{
    PredictorHistoryRepository, PredictorRecord, RepositoryError,
};
use crate::predictors::{PredictorEngine, PredictorService, ScoringConfig};

pub(crate) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(crate) fn answers() -> AnswerSet {
    AnswerSet {
        subject_id: SubjectId("X123456".to_string()),
        gender: Gender::Male,
        date_of_birth: date(1985, 3, 14),
        assessment_date: date(2024, 6, 1),
        current_offence: OffenceCode {
            code: "020".to_string(),
            subcode: "01".to_string(),
        },
        date_of_first_sanction: date(2001, 5, 1),
        total_sanctions: 50,
        total_violent_sanctions: 8,
        date_of_current_conviction: date(2024, 1, 10),
        has_any_sexual_offences: false,
        sexual_offence_history: None,
        earliest_release_date: Some(date(2024, 3, 1)),
        interview_completed: true,
        dynamic_factors: DynamicFactors {
            suitable_accommodation: Some(ProblemLevel::SignificantProblems),
            employment: Some(EmploymentStatus::Unemployed),
            current_relationship_with_partner: Some(ProblemLevel::SignificantProblems),
            evidence_of_domestic_violence: Some(true),
            domestic_violence_perpetrator: Some(true),
            current_alcohol_use_problems: Some(ProblemLevel::SignificantProblems),
            excessive_alcohol_use: Some(ProblemLevel::SignificantProblems),
            impulsivity_problems: Some(ProblemLevel::SignificantProblems),
            temper_control_issues: Some(ProblemLevel::SignificantProblems),
            pro_criminal_attitudes: Some(ProblemLevel::SignificantProblems),
        },
        previous_offences: PreviousOffences {
            wounding: true,
            robbery: true,
            ..PreviousOffences::default()
        },
        current_offences: CurrentOffences {
            firearm_possession: false,
            weapons_possession: true,
        },
    }
}

pub(crate) fn sexual_history() -> SexualOffenceHistory {
    SexualOffenceHistory {
        current_sexual_offence: false,
        current_offence_victim_stranger: false,
        most_recent_sexual_offence_date: date(2015, 8, 20),
        total_sexual_offences_adult: 1,
        total_sexual_offences_child: 0,
        total_sexual_offences_child_image: 0,
        total_non_contact_sexual_offences: 0,
    }
}

pub(crate) fn answers_with_sexual_history() -> AnswerSet {
    AnswerSet {
        has_any_sexual_offences: true,
        sexual_offence_history: Some(sexual_history()),
        ..answers()
    }
}

pub(crate) fn request(answers: AnswerSet) -> ScoringRequest {
    ScoringRequest {
        answers,
        precomputed: PrecomputedScores::default(),
    }
}

/// Upstream candidates for the three precomputed families.
pub(crate) fn precomputed() -> PrecomputedScores {
    let mut combined = FamilyScoreCandidate::calculated(Some(ScoreType::Static), 4.2);
    combined.algorithm_version = Some("6".to_string());
    PrecomputedScores {
        direct_contact_sexual: vec![FamilyScoreCandidate::calculated(None, 2.1)],
        indirect_image_sexual: vec![FamilyScoreCandidate {
            band: Some(RiskBand::Low),
            ..FamilyScoreCandidate::calculated(None, 0.8)
        }],
        combined_serious_reoffending: vec![
            FamilyScoreCandidate::not_calculated(Some(ScoreType::Dynamic)),
            combined,
        ],
    }
}

/// Head whose output ignores its input and always returns `probability`.
pub(crate) fn constant_head(
    family: PredictorFamily,
    variant: ScoreType,
    input_len: usize,
    probability: f64,
) -> HeadSpec {
    HeadSpec {
        family,
        variant,
        input_len,
        layers: vec![Layer::Dense {
            weights: vec![vec![0.0; input_len]],
            bias: vec![probability],
        }],
    }
}

/// Logistic head over the full vector, driven by sanctions and dynamic needs.
pub(crate) fn logistic_dynamic_head(family: PredictorFamily) -> HeadSpec {
    let mut weights = vec![0.0; FEATURE_LEN];
    weights[crate::predictors::encoder::index::TOTAL_SANCTIONS] = 0.04;
    weights[crate::predictors::encoder::index::TOTAL_VIOLENT_SANCTIONS] = 0.1;
    for weight in &mut weights[STATIC_LEN..] {
        *weight = 0.15;
    }
    HeadSpec {
        family,
        variant: ScoreType::Dynamic,
        input_len: FEATURE_LEN,
        layers: vec![
            Layer::Dense {
                weights: vec![weights],
                bias: vec![-3.0],
            },
            Layer::Sigmoid,
        ],
    }
}

pub(crate) fn artifact(version: &str, heads: Vec<HeadSpec>) -> ModelArtifact {
    ModelArtifact {
        format: ARTIFACT_FORMAT.to_string(),
        format_version: ARTIFACT_FORMAT_VERSION,
        model_version: version.to_string(),
        heads,
    }
}

/// Static heads only, every family returning `probability`.
pub(crate) fn constant_artifact(probability: f64) -> ModelArtifact {
    let heads = PredictorFamily::MODELLED
        .into_iter()
        .map(|family| constant_head(family, ScoreType::Static, STATIC_LEN, probability))
        .collect();
    artifact("test-static-1", heads)
}

/// Static and dynamic heads for every modelled family.
pub(crate) fn full_artifact() -> ModelArtifact {
    let mut heads = Vec::new();
    for family in PredictorFamily::MODELLED {
        heads.push(constant_head(family, ScoreType::Static, STATIC_LEN, 0.12));
        heads.push(logistic_dynamic_head(family));
    }
    artifact("test-full-1", heads)
}

pub(crate) fn reference_table() -> BandTable {
    BandTable::new(vec![
        Threshold::up_to(20.0, RiskBand::Low),
        Threshold::up_to(50.0, RiskBand::Medium),
        Threshold::up_to(80.0, RiskBand::High),
        Threshold::above(RiskBand::VeryHigh),
    ])
}

/// Scoring config using the `[20, 50, 80]` table for every family.
pub(crate) fn reference_config() -> ScoringConfig {
    let mut config = ScoringConfig::default();
    for family in PredictorFamily::ALL {
        config.bands.insert(family, reference_table());
    }
    config
}

pub(crate) fn engine(artifact: ModelArtifact) -> PredictorEngine {
    engine_with_config(artifact, reference_config())
}

pub(crate) fn engine_with_config(artifact: ModelArtifact, config: ScoringConfig) -> PredictorEngine {
    let model = ScoringModel::from_artifact(artifact).expect("artifact valid");
    PredictorEngine::new(ModelStore::new(model), config).expect("engine builds")
}

pub(crate) fn assert_close(actual: Option<f64>, expected: f64) {
    let actual = actual.expect("score present");
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

/// Writes `artifact` to a unique file under the system temp dir.
pub(crate) fn write_artifact(name: &str, artifact: &ModelArtifact) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "risk-predictors-{}-{name}.json",
        std::process::id()
    ));
    std::fs::write(&path, serde_json::to_vec(artifact).expect("serialize artifact"))
        .expect("write artifact");
    path
}

pub(crate) fn build_service(
    artifact: ModelArtifact,
    model_path: PathBuf,
) -> (PredictorService<MemoryHistory>, Arc<MemoryHistory>) {
    let repository = Arc::new(MemoryHistory::default());
    let service = PredictorService::new(Arc::new(engine(artifact)), repository.clone(), model_path);
    (service, repository)
}

#[derive(Default, Clone)]
pub(crate) struct MemoryHistory {
    pub(crate) records: Arc<Mutex<Vec<PredictorRecord>>>,
}

impl MemoryHistory {
    pub(crate) fn len(&self) -> usize {
        self.records.lock().expect("history mutex poisoned").len()
    }
}

impl PredictorHistoryRepository for MemoryHistory {
    fn save(&self, record: PredictorRecord) -> Result<PredictorRecord, RepositoryError> {
        self.records
            .lock()
            .expect("history mutex poisoned")
            .push(record.clone());
        Ok(record)
    }

    fn history(&self, subject_id: &SubjectId) -> Result<Vec<PredictorRecord>, RepositoryError> {
        let guard = self.records.lock().expect("history mutex poisoned");
        Ok(guard
            .iter()
            .filter(|record| &record.subject_id == subject_id)
            .cloned()
            .collect())
    }

    fn latest(&self, subject_id: &SubjectId) -> Result<Option<PredictorRecord>, RepositoryError> {
        Ok(self.history(subject_id)?.pop())
    }
}

pub(crate) struct UnavailableHistory;

impl PredictorHistoryRepository for UnavailableHistory {
    fn save(&self, _record: PredictorRecord) -> Result<PredictorRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn history(&self, _subject_id: &SubjectId) -> Result<Vec<PredictorRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn latest(&self, _subject_id: &SubjectId) -> Result<Option<PredictorRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(crate) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
