//! Scoring model artifacts and inference.
//!
//! An artifact is a JSON graph document holding one head per
//! `(family, variant)`. Each head is a small feed-forward graph ending in a
//! single probability.

mod store;

pub use store::ModelStore;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::domain::{PredictorFamily, ScoreType};
use super::encoder::FeatureVector;

pub const ARTIFACT_FORMAT: &str = "risk-predictor-graph";
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Serialized form of a scoring model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelArtifact {
    pub format: String,
    pub format_version: u32,
    pub model_version: String,
    pub heads: Vec<HeadSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadSpec {
    pub family: PredictorFamily,
    pub variant: ScoreType,
    pub input_len: usize,
    pub layers: Vec<Layer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Layer {
    /// `out[i] = bias[i] + sum_j weights[i][j] * in[j]`
    Dense { weights: Vec<Vec<f64>>, bias: Vec<f64> },
    /// `out[i] = (in[i] - mean[i]) / scale[i]`
    Standardize { mean: Vec<f64>, scale: Vec<f64> },
    Relu,
    Sigmoid,
}

/// Model output as a percentage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawScore {
    pub value: f64,
    /// Original value when the output fell outside `[0, 100]`.
    pub clamped_from: Option<f64>,
}

impl RawScore {
    fn from_probability(probability: f64) -> Self {
        let percent = probability * 100.0;
        if (0.0..=100.0).contains(&percent) {
            Self {
                value: percent,
                clamped_from: None,
            }
        } else {
            Self {
                value: percent.clamp(0.0, 100.0),
                clamped_from: Some(percent),
            }
        }
    }

    pub fn was_clamped(&self) -> bool {
        self.clamped_from.is_some()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ModelLoadError {
    #[error("unable to read model artifact {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("model artifact {} is not a valid graph document: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("unsupported artifact format '{found}' (expected '{}')", ARTIFACT_FORMAT)]
    UnsupportedFormat { found: String },
    #[error("unsupported artifact format version {found} (expected {})", ARTIFACT_FORMAT_VERSION)]
    UnsupportedVersion { found: u32 },
    #[error("model version must not be blank")]
    MissingVersion,
    #[error("artifact has no static head for {family}")]
    MissingHead { family: PredictorFamily },
    #[error("artifact declares {family}/{} more than once", .variant.label())]
    DuplicateHead {
        family: PredictorFamily,
        variant: ScoreType,
    },
    #[error("{family} is not scored by the local model")]
    UnexpectedFamily { family: PredictorFamily },
    #[error("head {family}/{} is malformed: {reason}", .variant.label())]
    InvalidHead {
        family: PredictorFamily,
        variant: ScoreType,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InferenceError {
    #[error("{family}/{} expects {expected} features, received {actual}", .variant.label())]
    ShapeMismatch {
        family: PredictorFamily,
        variant: ScoreType,
        expected: usize,
        actual: usize,
    },
    #[error("{family}/{} produced a non-finite score", .variant.label())]
    NonFinite {
        family: PredictorFamily,
        variant: ScoreType,
    },
}

#[derive(Debug, Clone)]
struct Head {
    input_len: usize,
    layers: Vec<Layer>,
}

impl Head {
    fn run(&self, input: &[f64]) -> f64 {
        let mut current = input.to_vec();
        for layer in &self.layers {
            current = match layer {
                Layer::Dense { weights, bias } => weights
                    .iter()
                    .zip(bias)
                    .map(|(row, b)| b + row.iter().zip(&current).map(|(w, x)| w * x).sum::<f64>())
                    .collect(),
                Layer::Standardize { mean, scale } => current
                    .iter()
                    .zip(mean.iter().zip(scale))
                    .map(|(x, (m, s))| (x - m) / s)
                    .collect(),
                Layer::Relu => current.into_iter().map(|x| x.max(0.0)).collect(),
                Layer::Sigmoid => current
                    .into_iter()
                    .map(|x| 1.0 / (1.0 + (-x).exp()))
                    .collect(),
            };
        }
        current.first().copied().unwrap_or(f64::NAN)
    }
}

/// Loaded, validated and immutable scoring model.
#[derive(Debug, Clone)]
pub struct ScoringModel {
    version: String,
    heads: BTreeMap<(PredictorFamily, ScoreType), Head>,
}

impl ScoringModel {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelLoadError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ModelLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let artifact: ModelArtifact =
            serde_json::from_str(&raw).map_err(|source| ModelLoadError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_artifact(artifact)
    }

    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self, ModelLoadError> {
        if artifact.format != ARTIFACT_FORMAT {
            return Err(ModelLoadError::UnsupportedFormat {
                found: artifact.format,
            });
        }
        if artifact.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(ModelLoadError::UnsupportedVersion {
                found: artifact.format_version,
            });
        }
        if artifact.model_version.trim().is_empty() {
            return Err(ModelLoadError::MissingVersion);
        }

        let mut heads = BTreeMap::new();
        for spec in artifact.heads {
            if !spec.family.is_modelled() {
                return Err(ModelLoadError::UnexpectedFamily {
                    family: spec.family,
                });
            }
            validate_head(&spec)?;
            let key = (spec.family, spec.variant);
            let head = Head {
                input_len: spec.input_len,
                layers: spec.layers,
            };
            if heads.insert(key, head).is_some() {
                return Err(ModelLoadError::DuplicateHead {
                    family: key.0,
                    variant: key.1,
                });
            }
        }

        for family in PredictorFamily::MODELLED {
            if !heads.contains_key(&(family, ScoreType::Static)) {
                return Err(ModelLoadError::MissingHead { family });
            }
        }

        Ok(Self {
            version: artifact.model_version,
            heads,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Declared input width of a head, if the artifact provides it.
    pub fn input_len(&self, family: PredictorFamily, variant: ScoreType) -> Option<usize> {
        self.heads.get(&(family, variant)).map(|head| head.input_len)
    }

    /// Scores one variant. `Ok(None)` means the variant cannot be calculated,
    /// either because the artifact has no such head or because the vector
    /// lacks the section the variant consumes.
    pub fn infer(
        &self,
        family: PredictorFamily,
        variant: ScoreType,
        features: &FeatureVector,
    ) -> Result<Option<RawScore>, InferenceError> {
        let Some(head) = self.heads.get(&(family, variant)) else {
            return Ok(None);
        };
        let input = match variant {
            ScoreType::Static => Some(features.static_features()),
            ScoreType::Dynamic => features.dynamic_features(),
        };
        let Some(input) = input else {
            return Ok(None);
        };

        if input.len() != head.input_len {
            return Err(InferenceError::ShapeMismatch {
                family,
                variant,
                expected: head.input_len,
                actual: input.len(),
            });
        }

        let probability = head.run(input);
        if !probability.is_finite() {
            return Err(InferenceError::NonFinite { family, variant });
        }

        Ok(Some(RawScore::from_probability(probability)))
    }
}

fn validate_head(spec: &HeadSpec) -> Result<(), ModelLoadError> {
    let invalid = |reason: String| ModelLoadError::InvalidHead {
        family: spec.family,
        variant: spec.variant,
        reason,
    };

    if spec.input_len == 0 {
        return Err(invalid("input length must be positive".to_string()));
    }
    if spec.layers.is_empty() {
        return Err(invalid("graph has no layers".to_string()));
    }

    let mut width = spec.input_len;
    for (position, layer) in spec.layers.iter().enumerate() {
        match layer {
            Layer::Dense { weights, bias } => {
                if weights.is_empty() || weights.len() != bias.len() {
                    return Err(invalid(format!(
                        "layer {position}: {} weight rows for {} biases",
                        weights.len(),
                        bias.len()
                    )));
                }
                if let Some(row) = weights.iter().find(|row| row.len() != width) {
                    return Err(invalid(format!(
                        "layer {position}: weight row of width {} where {width} expected",
                        row.len()
                    )));
                }
                if !weights.iter().flatten().chain(bias).all(|v| v.is_finite()) {
                    return Err(invalid(format!("layer {position}: non-finite parameter")));
                }
                width = bias.len();
            }
            Layer::Standardize { mean, scale } => {
                if mean.len() != width || scale.len() != width {
                    return Err(invalid(format!(
                        "layer {position}: standardize expects {width} entries"
                    )));
                }
                if !mean.iter().all(|v| v.is_finite())
                    || !scale.iter().all(|v| v.is_finite() && *v != 0.0)
                {
                    return Err(invalid(format!(
                        "layer {position}: standardize parameters must be finite with non-zero scale"
                    )));
                }
            }
            Layer::Relu | Layer::Sigmoid => {}
        }
    }

    if width != 1 {
        return Err(invalid(format!("graph ends with width {width}, expected 1")));
    }

    Ok(())
}
