use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identifier of the person being assessed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubjectId(pub String);

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Male,
    Female,
}

/// Ordinal severity recorded against a dynamic need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProblemLevel {
    NoProblems,
    SomeProblems,
    SignificantProblems,
}

impl ProblemLevel {
    pub const fn ordinal(self) -> f64 {
        match self {
            ProblemLevel::NoProblems => 0.0,
            ProblemLevel::SomeProblems => 1.0,
            ProblemLevel::SignificantProblems => 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmploymentStatus {
    Employed,
    Unemployed,
    NotAvailableForWork,
}

/// Offence classification code of the index offence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffenceCode {
    pub code: String,
    pub subcode: String,
}

/// Detail block required whenever the subject has any sexual offence history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SexualOffenceHistory {
    pub current_sexual_offence: bool,
    pub current_offence_victim_stranger: bool,
    pub most_recent_sexual_offence_date: NaiveDate,
    pub total_sexual_offences_adult: i32,
    pub total_sexual_offences_child: i32,
    pub total_sexual_offences_child_image: i32,
    pub total_non_contact_sexual_offences: i32,
}

/// Needs captured during the assessment interview.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DynamicFactors {
    pub suitable_accommodation: Option<ProblemLevel>,
    pub employment: Option<EmploymentStatus>,
    pub current_relationship_with_partner: Option<ProblemLevel>,
    pub evidence_of_domestic_violence: Option<bool>,
    pub domestic_violence_perpetrator: Option<bool>,
    pub current_alcohol_use_problems: Option<ProblemLevel>,
    pub excessive_alcohol_use: Option<ProblemLevel>,
    pub impulsivity_problems: Option<ProblemLevel>,
    pub temper_control_issues: Option<ProblemLevel>,
    pub pro_criminal_attitudes: Option<ProblemLevel>,
}

/// Prior convictions for violent or weapon offences.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreviousOffences {
    pub murder_attempt: bool,
    pub wounding: bool,
    pub kidnapping: bool,
    pub firearm_possession: bool,
    pub robbery: bool,
    pub aggravated_burglary: bool,
    pub weapons_possession: bool,
    pub criminal_damage_endangering_life: bool,
    pub arson: bool,
}

impl PreviousOffences {
    pub(crate) fn flags(&self) -> [bool; 9] {
        [
            self.murder_attempt,
            self.wounding,
            self.kidnapping,
            self.firearm_possession,
            self.robbery,
            self.aggravated_burglary,
            self.weapons_possession,
            self.criminal_damage_endangering_life,
            self.arson,
        ]
    }
}

/// Weapon involvement in the index offence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CurrentOffences {
    pub firearm_possession: bool,
    pub weapons_possession: bool,
}

/// Complete set of answers supplied by the case-management system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSet {
    pub subject_id: SubjectId,
    pub gender: Gender,
    pub date_of_birth: NaiveDate,
    pub assessment_date: NaiveDate,
    pub current_offence: OffenceCode,
    pub date_of_first_sanction: NaiveDate,
    pub total_sanctions: i32,
    pub total_violent_sanctions: i32,
    pub date_of_current_conviction: NaiveDate,
    pub has_any_sexual_offences: bool,
    #[serde(default)]
    pub sexual_offence_history: Option<SexualOffenceHistory>,
    #[serde(default)]
    pub earliest_release_date: Option<NaiveDate>,
    #[serde(default)]
    pub interview_completed: bool,
    #[serde(default)]
    pub dynamic_factors: DynamicFactors,
    #[serde(default)]
    pub previous_offences: PreviousOffences,
    #[serde(default)]
    pub current_offences: CurrentOffences,
}

/// Predictor families surfaced in every assessment.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PredictorFamily {
    AllReoffending,
    ViolentReoffending,
    SeriousViolentReoffending,
    DirectContactSexual,
    IndirectImageSexual,
    CombinedSeriousReoffending,
}

impl PredictorFamily {
    pub const ALL: [PredictorFamily; 6] = [
        PredictorFamily::AllReoffending,
        PredictorFamily::ViolentReoffending,
        PredictorFamily::SeriousViolentReoffending,
        PredictorFamily::DirectContactSexual,
        PredictorFamily::IndirectImageSexual,
        PredictorFamily::CombinedSeriousReoffending,
    ];

    /// Families scored by the locally loaded model.
    pub const MODELLED: [PredictorFamily; 3] = [
        PredictorFamily::AllReoffending,
        PredictorFamily::ViolentReoffending,
        PredictorFamily::SeriousViolentReoffending,
    ];

    pub const fn is_modelled(self) -> bool {
        matches!(
            self,
            PredictorFamily::AllReoffending
                | PredictorFamily::ViolentReoffending
                | PredictorFamily::SeriousViolentReoffending
        )
    }

    pub const fn is_sexual(self) -> bool {
        matches!(
            self,
            PredictorFamily::DirectContactSexual | PredictorFamily::IndirectImageSexual
        )
    }

    pub const fn label(self) -> &'static str {
        match self {
            PredictorFamily::AllReoffending => "all_reoffending",
            PredictorFamily::ViolentReoffending => "violent_reoffending",
            PredictorFamily::SeriousViolentReoffending => "serious_violent_reoffending",
            PredictorFamily::DirectContactSexual => "direct_contact_sexual",
            PredictorFamily::IndirectImageSexual => "indirect_image_sexual",
            PredictorFamily::CombinedSeriousReoffending => "combined_serious_reoffending",
        }
    }
}

impl fmt::Display for PredictorFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Whether a sub-score uses offence history only or also dynamic needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScoreType {
    Static,
    Dynamic,
}

impl ScoreType {
    pub const fn label(self) -> &'static str {
        match self {
            ScoreType::Static => "static",
            ScoreType::Dynamic => "dynamic",
        }
    }
}

/// Ordinal risk band; the derived `Ord` follows declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskBand {
    Low,
    Medium,
    High,
    VeryHigh,
}

/// One scoring attempt for a family, produced by the model or supplied upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyScoreCandidate {
    pub calculated: bool,
    #[serde(default)]
    pub variant: Option<ScoreType>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub band: Option<RiskBand>,
    #[serde(default)]
    pub algorithm_version: Option<String>,
}

impl FamilyScoreCandidate {
    pub fn calculated(variant: Option<ScoreType>, score: f64) -> Self {
        Self {
            calculated: true,
            variant,
            score: Some(score),
            band: None,
            algorithm_version: None,
        }
    }

    pub fn not_calculated(variant: Option<ScoreType>) -> Self {
        Self {
            calculated: false,
            variant,
            score: None,
            band: None,
            algorithm_version: None,
        }
    }
}

/// Public output for one predictor family.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictorResult {
    pub static_or_dynamic: Option<ScoreType>,
    pub score: Option<f64>,
    pub band: Option<RiskBand>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub algorithm_version: Option<String>,
}

impl PredictorResult {
    pub fn is_scored(&self) -> bool {
        self.score.is_some() && self.band.is_some()
    }
}

/// Scores computed upstream for families not served by the local model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrecomputedScores {
    pub direct_contact_sexual: Vec<FamilyScoreCandidate>,
    pub indirect_image_sexual: Vec<FamilyScoreCandidate>,
    pub combined_serious_reoffending: Vec<FamilyScoreCandidate>,
}

impl PrecomputedScores {
    pub fn for_family(&self, family: PredictorFamily) -> &[FamilyScoreCandidate] {
        match family {
            PredictorFamily::DirectContactSexual => &self.direct_contact_sexual,
            PredictorFamily::IndirectImageSexual => &self.indirect_image_sexual,
            PredictorFamily::CombinedSeriousReoffending => &self.combined_serious_reoffending,
            _ => &[],
        }
    }
}

/// Input to a single assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringRequest {
    pub answers: AnswerSet,
    #[serde(default)]
    pub precomputed: PrecomputedScores,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    Validation,
    Inference,
    InconsistentInput,
    ScoreClamped,
    Configuration,
    Cancelled,
}

/// Per-family failure or anomaly recorded alongside the aggregate result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyDiagnostic {
    pub family: PredictorFamily,
    pub kind: DiagnosticKind,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub field: Option<String>,
    pub message: String,
}

/// Full assessment response with one entry per predictor family.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResult {
    pub all_reoffending_predictor: PredictorResult,
    pub violent_reoffending_predictor: PredictorResult,
    pub serious_violent_reoffending_predictor: PredictorResult,
    pub direct_contact_sexual_reoffending_predictor: PredictorResult,
    pub indirect_image_contact_sexual_reoffending_predictor: PredictorResult,
    pub combined_serious_reoffending_predictor: PredictorResult,
    pub model_version: String,
    #[serde(default)]
    pub diagnostics: Vec<FamilyDiagnostic>,
}

impl AggregateResult {
    pub fn predictor(&self, family: PredictorFamily) -> &PredictorResult {
        match family {
            PredictorFamily::AllReoffending => &self.all_reoffending_predictor,
            PredictorFamily::ViolentReoffending => &self.violent_reoffending_predictor,
            PredictorFamily::SeriousViolentReoffending => {
                &self.serious_violent_reoffending_predictor
            }
            PredictorFamily::DirectContactSexual => {
                &self.direct_contact_sexual_reoffending_predictor
            }
            PredictorFamily::IndirectImageSexual => {
                &self.indirect_image_contact_sexual_reoffending_predictor
            }
            PredictorFamily::CombinedSeriousReoffending => {
                &self.combined_serious_reoffending_predictor
            }
        }
    }

    pub(crate) fn predictor_mut(&mut self, family: PredictorFamily) -> &mut PredictorResult {
        match family {
            PredictorFamily::AllReoffending => &mut self.all_reoffending_predictor,
            PredictorFamily::ViolentReoffending => &mut self.violent_reoffending_predictor,
            PredictorFamily::SeriousViolentReoffending => {
                &mut self.serious_violent_reoffending_predictor
            }
            PredictorFamily::DirectContactSexual => {
                &mut self.direct_contact_sexual_reoffending_predictor
            }
            PredictorFamily::IndirectImageSexual => {
                &mut self.indirect_image_contact_sexual_reoffending_predictor
            }
            PredictorFamily::CombinedSeriousReoffending => {
                &mut self.combined_serious_reoffending_predictor
            }
        }
    }

    pub fn diagnostics_for(&self, family: PredictorFamily) -> Vec<&FamilyDiagnostic> {
        self.diagnostics
            .iter()
            .filter(|diagnostic| diagnostic.family == family)
            .collect()
    }
}
