//! Reoffending-risk predictor scoring.
//!
//! [`predictors::PredictorEngine`] turns one assessment's answers into six
//! predictor results: three scored by the local model and three composed
//! from precomputed upstream candidates.

pub mod config;
pub mod error;
pub mod predictors;
pub mod telemetry;
