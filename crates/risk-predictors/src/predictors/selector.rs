use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{FamilyScoreCandidate, PredictorFamily, ScoreType};

/// Order in which a family's candidates are considered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityOrder {
    /// Family without variants; the first calculated candidate wins.
    Single,
    /// Variants checked in the listed order.
    Ranked(Vec<ScoreType>),
}

impl PriorityOrder {
    pub fn dynamic_first() -> Self {
        Self::Ranked(vec![ScoreType::Dynamic, ScoreType::Static])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("no candidate priority order defined for {family}")]
    MissingPriority { family: PredictorFamily },
    #[error("candidate priority order for {family} is empty")]
    EmptyPriority { family: PredictorFamily },
    #[error("candidate priority order for {family} lists {} twice", .variant.label())]
    RepeatedVariant {
        family: PredictorFamily,
        variant: ScoreType,
    },
}

/// Picks the candidate to surface. Returns `None` when nothing was calculated.
pub fn select<'a>(
    order: &PriorityOrder,
    candidates: &'a [FamilyScoreCandidate],
) -> Option<&'a FamilyScoreCandidate> {
    match order {
        PriorityOrder::Single => candidates.iter().find(|candidate| candidate.calculated),
        PriorityOrder::Ranked(variants) => variants.iter().find_map(|variant| {
            candidates
                .iter()
                .find(|candidate| candidate.calculated && candidate.variant == Some(*variant))
        }),
    }
}

/// Algorithm version to report: the selected candidate's tag, or when nothing
/// was selected, the first tag any candidate carries. Never defaulted.
pub fn algorithm_version<'a>(
    selected: Option<&'a FamilyScoreCandidate>,
    candidates: &'a [FamilyScoreCandidate],
) -> Option<&'a str> {
    match selected {
        Some(candidate) => candidate.algorithm_version.as_deref(),
        None => candidates
            .iter()
            .find_map(|candidate| candidate.algorithm_version.as_deref()),
    }
}

/// Priority orders for every predictor family.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriorityTable {
    orders: BTreeMap<PredictorFamily, PriorityOrder>,
}

impl PriorityTable {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn defaults() -> Self {
        let mut table = Self::empty();
        for family in PredictorFamily::ALL {
            let order = if family.is_sexual() {
                PriorityOrder::Single
            } else {
                PriorityOrder::dynamic_first()
            };
            table.insert(family, order);
        }
        table
    }

    pub fn insert(&mut self, family: PredictorFamily, order: PriorityOrder) {
        self.orders.insert(family, order);
    }

    pub fn order(&self, family: PredictorFamily) -> Result<&PriorityOrder, ConfigurationError> {
        self.orders
            .get(&family)
            .ok_or(ConfigurationError::MissingPriority { family })
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        for family in PredictorFamily::ALL {
            if let PriorityOrder::Ranked(variants) = self.order(family)? {
                if variants.is_empty() {
                    return Err(ConfigurationError::EmptyPriority { family });
                }
                for (position, variant) in variants.iter().enumerate() {
                    if variants[..position].contains(variant) {
                        return Err(ConfigurationError::RepeatedVariant {
                            family,
                            variant: *variant,
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(variant: ScoreType, calculated: bool, score: f64) -> FamilyScoreCandidate {
        if calculated {
            FamilyScoreCandidate::calculated(Some(variant), score)
        } else {
            FamilyScoreCandidate::not_calculated(Some(variant))
        }
    }

    #[test]
    fn falls_back_to_static_when_dynamic_not_calculated() {
        let candidates = [
            candidate(ScoreType::Dynamic, false, 0.0),
            candidate(ScoreType::Static, true, 42.0),
        ];
        let selected = select(&PriorityOrder::dynamic_first(), &candidates).expect("selected");
        assert_eq!(selected.variant, Some(ScoreType::Static));
        assert_eq!(selected.score, Some(42.0));
    }

    #[test]
    fn dynamic_wins_when_calculated() {
        let candidates = [
            candidate(ScoreType::Dynamic, true, 10.0),
            candidate(ScoreType::Static, true, 42.0),
        ];
        let selected = select(&PriorityOrder::dynamic_first(), &candidates).expect("selected");
        assert_eq!(selected.variant, Some(ScoreType::Dynamic));
        assert_eq!(selected.score, Some(10.0));
    }

    #[test]
    fn priority_ignores_candidate_list_order() {
        let candidates = [
            candidate(ScoreType::Static, true, 42.0),
            candidate(ScoreType::Dynamic, true, 10.0),
        ];
        let selected = select(&PriorityOrder::dynamic_first(), &candidates).expect("selected");
        assert_eq!(selected.variant, Some(ScoreType::Dynamic));
    }

    #[test]
    fn nothing_calculated_selects_nothing() {
        let candidates = [
            candidate(ScoreType::Dynamic, false, 0.0),
            candidate(ScoreType::Static, false, 0.0),
        ];
        assert!(select(&PriorityOrder::dynamic_first(), &candidates).is_none());
        assert!(select(&PriorityOrder::Single, &[]).is_none());
    }

    #[test]
    fn selection_is_repeatable() {
        let candidates = [
            candidate(ScoreType::Dynamic, false, 0.0),
            candidate(ScoreType::Static, true, 42.0),
        ];
        let first = select(&PriorityOrder::dynamic_first(), &candidates);
        for _ in 0..10 {
            assert_eq!(select(&PriorityOrder::dynamic_first(), &candidates), first);
        }
    }

    #[test]
    fn single_order_takes_first_calculated_candidate() {
        let candidates = [
            FamilyScoreCandidate::not_calculated(None),
            FamilyScoreCandidate::calculated(None, 3.2),
            FamilyScoreCandidate::calculated(None, 9.9),
        ];
        let selected = select(&PriorityOrder::Single, &candidates).expect("selected");
        assert_eq!(selected.score, Some(3.2));
    }

    #[test]
    fn algorithm_version_is_carried_verbatim() {
        let mut dynamic = candidate(ScoreType::Dynamic, true, 4.1);
        dynamic.algorithm_version = Some("5".to_string());
        let mut fallback = candidate(ScoreType::Static, false, 0.0);
        fallback.algorithm_version = Some("6 ".to_string());
        let candidates = [fallback, dynamic];

        let selected = select(&PriorityOrder::dynamic_first(), &candidates);
        assert_eq!(algorithm_version(selected, &candidates), Some("5"));

        let none_calculated = [candidates[0].clone()];
        let selected = select(&PriorityOrder::dynamic_first(), &none_calculated);
        assert_eq!(algorithm_version(selected, &none_calculated), Some("6 "));

        let untagged = [candidate(ScoreType::Static, true, 1.0)];
        let selected = select(&PriorityOrder::dynamic_first(), &untagged);
        assert_eq!(algorithm_version(selected, &untagged), None);
    }

    #[test]
    fn defaults_cover_every_family() {
        let table = PriorityTable::defaults();
        table.validate().expect("defaults valid");
        assert_eq!(
            table.order(PredictorFamily::DirectContactSexual),
            Ok(&PriorityOrder::Single)
        );
        assert_eq!(
            table.order(PredictorFamily::CombinedSeriousReoffending),
            Ok(&PriorityOrder::dynamic_first())
        );
    }

    #[test]
    fn validation_rejects_missing_and_malformed_orders() {
        let mut table = PriorityTable::defaults();
        table.orders.remove(&PredictorFamily::ViolentReoffending);
        assert_eq!(
            table.validate(),
            Err(ConfigurationError::MissingPriority {
                family: PredictorFamily::ViolentReoffending
            })
        );

        let mut table = PriorityTable::defaults();
        table.insert(PredictorFamily::AllReoffending, PriorityOrder::Ranked(Vec::new()));
        assert!(matches!(
            table.validate(),
            Err(ConfigurationError::EmptyPriority { .. })
        ));

        let mut table = PriorityTable::defaults();
        table.insert(
            PredictorFamily::AllReoffending,
            PriorityOrder::Ranked(vec![ScoreType::Static, ScoreType::Static]),
        );
        assert!(matches!(
            table.validate(),
            Err(ConfigurationError::RepeatedVariant { .. })
        ));
    }

    #[test]
    fn orders_deserialize_from_config() {
        let single: PriorityOrder = serde_json::from_str(r#""single""#).expect("single");
        assert_eq!(single, PriorityOrder::Single);
        let ranked: PriorityOrder =
            serde_json::from_str(r#"{"ranked": ["STATIC", "DYNAMIC"]}"#).expect("ranked");
        assert_eq!(
            ranked,
            PriorityOrder::Ranked(vec![ScoreType::Static, ScoreType::Dynamic])
        );
    }
}
