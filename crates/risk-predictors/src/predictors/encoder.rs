//! Turns an [`AnswerSet`] into the fixed-order feature vector consumed by the
//! scoring model.
//!
//! The layout below is part of the model contract. Reordering or re-encoding
//! any index requires a new model artifact.
//!
//! | index | feature | encoding |
//! |---|---|---|
//! | 0 | gender | male 1, female 0 |
//! | 1 | age at assessment | whole years |
//! | 2 | age at first sanction | whole years |
//! | 3 | total sanctions | count |
//! | 4 | total violent sanctions | count |
//! | 5 | current conviction to assessment | days |
//! | 6 | time at risk since earliest release | days, 0 when absent or later than assessment |
//! | 7 | any sexual offences | 0/1 |
//! | 8 | current sexual offence | 0/1 |
//! | 9..=17 | previous violent/weapon offences | 0/1 each |
//! | 18 | current offence firearm possession | 0/1 |
//! | 19 | current offence weapons possession | 0/1 |
//! | 20 | accommodation | ordinal 0/1/2 |
//! | 21 | unemployed | one-hot |
//! | 22 | not available for work | one-hot |
//! | 23 | relationship with partner | ordinal 0/1/2 |
//! | 24 | evidence of domestic violence | 0/1 |
//! | 25 | domestic violence perpetrator | 0/1 |
//! | 26 | current alcohol use | ordinal 0/1/2 |
//! | 27 | excessive alcohol use | ordinal 0/1/2 |
//! | 28 | impulsivity | ordinal 0/1/2 |
//! | 29 | temper control | ordinal 0/1/2 |
//! | 30 | pro-criminal attitudes | ordinal 0/1/2 |

use chrono::{Datelike, NaiveDate};

use super::domain::{AnswerSet, DynamicFactors, EmploymentStatus, Gender, SexualOffenceHistory};

/// Feature indices of the model contract.
pub mod index {
    pub const GENDER_MALE: usize = 0;
    pub const AGE_AT_ASSESSMENT: usize = 1;
    pub const AGE_AT_FIRST_SANCTION: usize = 2;
    pub const TOTAL_SANCTIONS: usize = 3;
    pub const TOTAL_VIOLENT_SANCTIONS: usize = 4;
    pub const DAYS_SINCE_CONVICTION: usize = 5;
    pub const DAYS_AT_RISK: usize = 6;
    pub const ANY_SEXUAL_OFFENCES: usize = 7;
    pub const CURRENT_SEXUAL_OFFENCE: usize = 8;
    pub const PREVIOUS_OFFENCES: usize = 9;
    pub const CURRENT_FIREARM: usize = 18;
    pub const CURRENT_WEAPONS: usize = 19;
    pub const ACCOMMODATION: usize = 20;
    pub const UNEMPLOYED: usize = 21;
    pub const NOT_AVAILABLE_FOR_WORK: usize = 22;
    pub const RELATIONSHIP: usize = 23;
    pub const DOMESTIC_VIOLENCE: usize = 24;
    pub const DOMESTIC_VIOLENCE_PERPETRATOR: usize = 25;
    pub const ALCOHOL_USE: usize = 26;
    pub const EXCESSIVE_ALCOHOL_USE: usize = 27;
    pub const IMPULSIVITY: usize = 28;
    pub const TEMPER_CONTROL: usize = 29;
    pub const PRO_CRIMINAL_ATTITUDES: usize = 30;
}

/// Width of the history-only prefix consumed by static heads.
pub const STATIC_LEN: usize = 20;
/// Width of the full vector consumed by dynamic heads.
pub const FEATURE_LEN: usize = 31;

const MIN_AGE_AT_FIRST_SANCTION: i32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    fn new(field: &str, reason: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Encoded answers. The dynamic section is only usable when the interview
/// supplied every dynamic factor.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: Vec<f64>,
    dynamic: bool,
}

impl FeatureVector {
    pub fn static_features(&self) -> &[f64] {
        &self.values[..STATIC_LEN.min(self.values.len())]
    }

    /// Full vector, or `None` when the dynamic section could not be encoded.
    pub fn dynamic_features(&self) -> Option<&[f64]> {
        self.dynamic.then_some(self.values.as_slice())
    }

    pub fn has_dynamic(&self) -> bool {
        self.dynamic
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn from_parts(values: Vec<f64>, dynamic: bool) -> Self {
        Self { values, dynamic }
    }
}

pub fn encode(answers: &AnswerSet) -> Result<FeatureVector, ValidationError> {
    validate_core(answers)?;

    let mut values = vec![0.0; FEATURE_LEN];

    values[index::GENDER_MALE] = flag(answers.gender == Gender::Male);
    values[index::AGE_AT_ASSESSMENT] =
        whole_years_between(answers.date_of_birth, answers.assessment_date) as f64;
    values[index::AGE_AT_FIRST_SANCTION] =
        whole_years_between(answers.date_of_birth, answers.date_of_first_sanction) as f64;
    values[index::TOTAL_SANCTIONS] = answers.total_sanctions as f64;
    values[index::TOTAL_VIOLENT_SANCTIONS] = answers.total_violent_sanctions as f64;
    values[index::DAYS_SINCE_CONVICTION] =
        days_between(answers.date_of_current_conviction, answers.assessment_date) as f64;
    values[index::DAYS_AT_RISK] = answers
        .earliest_release_date
        .map(|release| days_between(release, answers.assessment_date).max(0) as f64)
        .unwrap_or(0.0);

    values[index::ANY_SEXUAL_OFFENCES] = flag(answers.has_any_sexual_offences);
    values[index::CURRENT_SEXUAL_OFFENCE] = flag(
        answers.has_any_sexual_offences
            && answers
                .sexual_offence_history
                .as_ref()
                .is_some_and(|history| history.current_sexual_offence),
    );

    for (offset, present) in answers.previous_offences.flags().into_iter().enumerate() {
        values[index::PREVIOUS_OFFENCES + offset] = flag(present);
    }
    values[index::CURRENT_FIREARM] = flag(answers.current_offences.firearm_possession);
    values[index::CURRENT_WEAPONS] = flag(answers.current_offences.weapons_possession);

    let dynamic = answers.interview_completed
        && encode_dynamic(&answers.dynamic_factors, &mut values).is_some();
    if !dynamic {
        values[STATIC_LEN..].iter_mut().for_each(|value| *value = 0.0);
    }

    Ok(FeatureVector { values, dynamic })
}

/// Validates the sexual offence detail block used by the sexual families.
pub fn validate_sexual_history(
    answers: &AnswerSet,
) -> Result<&SexualOffenceHistory, ValidationError> {
    if !answers.has_any_sexual_offences {
        return Err(ValidationError::new(
            "hasAnySexualOffences",
            "no sexual offence history recorded",
        ));
    }

    let history = answers.sexual_offence_history.as_ref().ok_or_else(|| {
        ValidationError::new(
            "sexualOffenceHistory",
            "required when hasAnySexualOffences is true",
        )
    })?;

    let counts = [
        ("totalSexualOffencesAdult", history.total_sexual_offences_adult),
        ("totalSexualOffencesChild", history.total_sexual_offences_child),
        (
            "totalSexualOffencesChildImage",
            history.total_sexual_offences_child_image,
        ),
        (
            "totalNonContactSexualOffences",
            history.total_non_contact_sexual_offences,
        ),
    ];
    for (field, count) in counts {
        if count < 0 {
            return Err(ValidationError::new(field, "must not be negative"));
        }
    }
    if counts.iter().all(|(_, count)| *count == 0) {
        return Err(ValidationError::new(
            "sexualOffenceHistory",
            "at least one sexual offence count must be positive",
        ));
    }

    let most_recent = history.most_recent_sexual_offence_date;
    if most_recent <= answers.date_of_birth {
        return Err(ValidationError::new(
            "mostRecentSexualOffenceDate",
            "must be after date of birth",
        ));
    }
    if most_recent > answers.assessment_date {
        return Err(ValidationError::new(
            "mostRecentSexualOffenceDate",
            "must not be after the assessment date",
        ));
    }

    Ok(history)
}

fn validate_core(answers: &AnswerSet) -> Result<(), ValidationError> {
    if answers.subject_id.0.trim().is_empty() {
        return Err(ValidationError::new("subjectId", "must not be blank"));
    }

    let offence = &answers.current_offence;
    if !is_digits(&offence.code, 3) {
        return Err(ValidationError::new(
            "currentOffence.code",
            "must be three digits",
        ));
    }
    if !is_digits(&offence.subcode, 2) {
        return Err(ValidationError::new(
            "currentOffence.subcode",
            "must be two digits",
        ));
    }

    if answers.date_of_birth >= answers.assessment_date {
        return Err(ValidationError::new(
            "dateOfBirth",
            "must be before the assessment date",
        ));
    }
    if answers.date_of_first_sanction <= answers.date_of_birth {
        return Err(ValidationError::new(
            "dateOfFirstSanction",
            "must be after date of birth",
        ));
    }
    if whole_years_between(answers.date_of_birth, answers.date_of_first_sanction)
        < MIN_AGE_AT_FIRST_SANCTION
    {
        return Err(ValidationError::new(
            "dateOfFirstSanction",
            format!("subject must be at least {MIN_AGE_AT_FIRST_SANCTION} at first sanction"),
        ));
    }
    if answers.date_of_first_sanction > answers.date_of_current_conviction {
        return Err(ValidationError::new(
            "dateOfFirstSanction",
            "must not be after the current conviction",
        ));
    }
    if answers.date_of_current_conviction > answers.assessment_date {
        return Err(ValidationError::new(
            "dateOfCurrentConviction",
            "must not be after the assessment date",
        ));
    }

    if answers.total_sanctions < 1 {
        return Err(ValidationError::new(
            "totalSanctions",
            "must include the current conviction",
        ));
    }
    if answers.total_violent_sanctions < 0 {
        return Err(ValidationError::new(
            "totalViolentSanctions",
            "must not be negative",
        ));
    }
    if answers.total_violent_sanctions > answers.total_sanctions {
        return Err(ValidationError::new(
            "totalViolentSanctions",
            "must not exceed total sanctions",
        ));
    }

    if let Some(release) = answers.earliest_release_date {
        if release < answers.date_of_current_conviction {
            return Err(ValidationError::new(
                "earliestReleaseDate",
                "must not be before the current conviction",
            ));
        }
    }

    let dynamic = &answers.dynamic_factors;
    if dynamic.evidence_of_domestic_violence != Some(true)
        && dynamic.domestic_violence_perpetrator == Some(true)
    {
        return Err(ValidationError::new(
            "dynamicFactors.domesticViolencePerpetrator",
            "requires evidence of domestic violence",
        ));
    }

    Ok(())
}

/// Writes the dynamic section; `None` when any factor is missing.
fn encode_dynamic(factors: &DynamicFactors, values: &mut [f64]) -> Option<()> {
    values[index::ACCOMMODATION] = factors.suitable_accommodation?.ordinal();

    let employment = factors.employment?;
    values[index::UNEMPLOYED] = flag(employment == EmploymentStatus::Unemployed);
    values[index::NOT_AVAILABLE_FOR_WORK] =
        flag(employment == EmploymentStatus::NotAvailableForWork);

    values[index::RELATIONSHIP] = factors.current_relationship_with_partner?.ordinal();

    let domestic_violence = factors.evidence_of_domestic_violence?;
    values[index::DOMESTIC_VIOLENCE] = flag(domestic_violence);
    values[index::DOMESTIC_VIOLENCE_PERPETRATOR] = if domestic_violence {
        flag(factors.domestic_violence_perpetrator?)
    } else {
        0.0
    };

    values[index::ALCOHOL_USE] = factors.current_alcohol_use_problems?.ordinal();
    values[index::EXCESSIVE_ALCOHOL_USE] = factors.excessive_alcohol_use?.ordinal();
    values[index::IMPULSIVITY] = factors.impulsivity_problems?.ordinal();
    values[index::TEMPER_CONTROL] = factors.temper_control_issues?.ordinal();
    values[index::PRO_CRIMINAL_ATTITUDES] = factors.pro_criminal_attitudes?.ordinal();

    Some(())
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

fn is_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.bytes().all(|byte| byte.is_ascii_digit())
}

pub(crate) fn whole_years_between(from: NaiveDate, to: NaiveDate) -> i32 {
    let mut years = to.year() - from.year();
    if (to.month(), to.day()) < (from.month(), from.day()) {
        years -= 1;
    }
    years
}

fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    to.signed_duration_since(from).num_days()
}
