use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{PredictorFamily, RiskBand};

/// One row of a band table. `None` as the upper bound is the catch-all row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Threshold {
    pub upper_bound: Option<f64>,
    pub band: RiskBand,
}

impl Threshold {
    pub const fn up_to(upper_bound: f64, band: RiskBand) -> Self {
        Self {
            upper_bound: Some(upper_bound),
            band,
        }
    }

    pub const fn above(band: RiskBand) -> Self {
        Self {
            upper_bound: None,
            band,
        }
    }
}

/// Ordered thresholds for one family, evaluated lowest bound first. Upper
/// bounds are inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BandTable {
    thresholds: Vec<Threshold>,
}

impl BandTable {
    pub fn new(thresholds: Vec<Threshold>) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &[Threshold] {
        &self.thresholds
    }

    pub fn classify(&self, score: f64) -> Option<RiskBand> {
        self.thresholds
            .iter()
            .find(|threshold| threshold.upper_bound.map_or(true, |bound| score <= bound))
            .map(|threshold| threshold.band)
    }

    fn validate(&self, family: PredictorFamily) -> Result<(), ClassificationError> {
        let invalid = |reason: &str| ClassificationError::InvalidTable {
            family,
            reason: reason.to_string(),
        };

        let Some((last, bounded)) = self.thresholds.split_last() else {
            return Err(invalid("table is empty"));
        };
        if last.upper_bound.is_some() {
            return Err(invalid("last threshold must be unbounded"));
        }

        let mut previous: Option<&Threshold> = None;
        for threshold in bounded {
            let Some(bound) = threshold.upper_bound else {
                return Err(invalid("only the last threshold may be unbounded"));
            };
            if !bound.is_finite() {
                return Err(invalid("upper bounds must be finite"));
            }
            if let Some(prev) = previous {
                if prev.upper_bound.is_some_and(|prev_bound| prev_bound >= bound) {
                    return Err(invalid("upper bounds must be strictly ascending"));
                }
                if prev.band > threshold.band {
                    return Err(invalid("bands must not decrease as scores rise"));
                }
            }
            previous = Some(threshold);
        }
        if previous.is_some_and(|prev| prev.band > last.band) {
            return Err(invalid("bands must not decrease as scores rise"));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClassificationError {
    #[error("no band table registered for {family}")]
    MissingTable { family: PredictorFamily },
    #[error("band table for {family} is invalid: {reason}")]
    InvalidTable {
        family: PredictorFamily,
        reason: String,
    },
}

/// Band tables for every predictor family.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BandTables {
    tables: BTreeMap<PredictorFamily, BandTable>,
}

impl BandTables {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Built-in deployment defaults; production tables normally arrive through
    /// the scoring config file.
    pub fn defaults() -> Self {
        use RiskBand::{High, Low, Medium, VeryHigh};

        Self::empty()
            .with_table(
                PredictorFamily::AllReoffending,
                BandTable::new(vec![
                    Threshold::up_to(49.0, Low),
                    Threshold::up_to(74.0, Medium),
                    Threshold::up_to(89.0, High),
                    Threshold::above(VeryHigh),
                ]),
            )
            .with_table(
                PredictorFamily::ViolentReoffending,
                BandTable::new(vec![
                    Threshold::up_to(29.0, Low),
                    Threshold::up_to(59.0, Medium),
                    Threshold::up_to(79.0, High),
                    Threshold::above(VeryHigh),
                ]),
            )
            .with_table(
                PredictorFamily::SeriousViolentReoffending,
                BandTable::new(vec![
                    Threshold::up_to(0.99, Low),
                    Threshold::up_to(2.99, Medium),
                    Threshold::up_to(6.89, High),
                    Threshold::above(VeryHigh),
                ]),
            )
            .with_table(
                PredictorFamily::DirectContactSexual,
                BandTable::new(vec![
                    Threshold::up_to(1.12, Low),
                    Threshold::up_to(2.62, Medium),
                    Threshold::up_to(6.89, High),
                    Threshold::above(VeryHigh),
                ]),
            )
            .with_table(
                PredictorFamily::IndirectImageSexual,
                BandTable::new(vec![
                    Threshold::up_to(1.12, Low),
                    Threshold::up_to(3.11, Medium),
                    Threshold::above(High),
                ]),
            )
            .with_table(
                PredictorFamily::CombinedSeriousReoffending,
                BandTable::new(vec![
                    Threshold::up_to(2.99, Low),
                    Threshold::up_to(6.89, Medium),
                    Threshold::above(High),
                ]),
            )
    }

    pub fn with_table(mut self, family: PredictorFamily, table: BandTable) -> Self {
        self.tables.insert(family, table);
        self
    }

    pub fn insert(&mut self, family: PredictorFamily, table: BandTable) {
        self.tables.insert(family, table);
    }

    pub fn table(&self, family: PredictorFamily) -> Option<&BandTable> {
        self.tables.get(&family)
    }

    /// Startup check: every family needs a well-formed table.
    pub fn validate(&self) -> Result<(), ClassificationError> {
        for family in PredictorFamily::ALL {
            self.tables
                .get(&family)
                .ok_or(ClassificationError::MissingTable { family })?
                .validate(family)?;
        }
        Ok(())
    }

    pub fn classify(
        &self,
        family: PredictorFamily,
        score: f64,
    ) -> Result<RiskBand, ClassificationError> {
        let table = self
            .tables
            .get(&family)
            .ok_or(ClassificationError::MissingTable { family })?;
        table
            .classify(score)
            .ok_or_else(|| ClassificationError::InvalidTable {
                family,
                reason: "no threshold covers the score".to_string(),
            })
    }
}
