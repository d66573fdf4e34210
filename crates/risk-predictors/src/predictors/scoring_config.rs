use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::bands::{BandTable, BandTables, ClassificationError};
use super::domain::PredictorFamily;
use super::selector::{ConfigurationError, PriorityOrder, PriorityTable};

/// Band tables and candidate priorities used by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub bands: BandTables,
    pub priorities: PriorityTable,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            bands: BandTables::defaults(),
            priorities: PriorityTable::defaults(),
        }
    }
}

/// On-disk shape. Families left out keep their built-in settings.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScoringConfigFile {
    #[serde(default)]
    bands: BTreeMap<PredictorFamily, BandTable>,
    #[serde(default)]
    priorities: BTreeMap<PredictorFamily, PriorityOrder>,
}

#[derive(Debug, thiserror::Error)]
pub enum ScoringConfigError {
    #[error("unable to read scoring config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("scoring config {} is malformed: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ScoringConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScoringConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ScoringConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw).map_err(|source| ScoringConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let file: ScoringConfigFile = serde_json::from_str(raw)?;
        let mut config = Self::default();
        for (family, table) in file.bands {
            config.bands.insert(family, table);
        }
        for (family, order) in file.priorities {
            config.priorities.insert(family, order);
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ScoringConfigInvalid> {
        self.bands.validate()?;
        self.priorities.validate()?;
        Ok(())
    }
}

/// Startup validation failure of a merged scoring config.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoringConfigInvalid {
    #[error(transparent)]
    Classification(#[from] ClassificationError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictors::domain::{RiskBand, ScoreType};

    #[test]
    fn overrides_merge_onto_defaults() {
        let raw = r#"{
            "bands": {
                "ALL_REOFFENDING": [
                    {"upperBound": 20.0, "band": "LOW"},
                    {"upperBound": 50.0, "band": "MEDIUM"},
                    {"upperBound": 80.0, "band": "HIGH"},
                    {"upperBound": null, "band": "VERY_HIGH"}
                ]
            },
            "priorities": {
                "COMBINED_SERIOUS_REOFFENDING": {"ranked": ["STATIC", "DYNAMIC"]}
            }
        }"#;

        let config = ScoringConfig::from_json(raw).expect("config parses");
        config.validate().expect("merged config valid");

        assert_eq!(
            config.bands.classify(PredictorFamily::AllReoffending, 50.0),
            Ok(RiskBand::Medium)
        );
        assert_eq!(
            config.bands.classify(PredictorFamily::ViolentReoffending, 50.0),
            Ok(RiskBand::Medium)
        );
        assert_eq!(
            config
                .priorities
                .order(PredictorFamily::CombinedSeriousReoffending),
            Ok(&PriorityOrder::Ranked(vec![ScoreType::Static, ScoreType::Dynamic]))
        );
    }

    #[test]
    fn invalid_override_fails_validation() {
        let raw = r#"{"bands": {"VIOLENT_REOFFENDING": [{"upperBound": 10.0, "band": "LOW"}]}}"#;
        let config = ScoringConfig::from_json(raw).expect("config parses");
        assert!(matches!(
            config.validate(),
            Err(ScoringConfigInvalid::Classification(
                ClassificationError::InvalidTable { .. }
            ))
        ));
    }

    #[test]
    fn unknown_sections_are_rejected() {
        assert!(ScoringConfig::from_json(r#"{"thresholds": {}}"#).is_err());
    }

    #[test]
    fn empty_document_yields_defaults() {
        let config = ScoringConfig::from_json("{}").expect("config parses");
        assert_eq!(config, ScoringConfig::default());
    }
}
