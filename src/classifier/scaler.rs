//! Feature scaling fitted at training time.

use crate::features::{FeatureVector, FEATURE_COUNT};
use serde::Deserialize;

use super::ClassifierLoadError;

/// Stored scaler parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scaler {
    /// `(x - mean) / scale`
    Standard { mean: Vec<f64>, scale: Vec<f64> },
    /// `x * scale + min`
    MinMax { min: Vec<f64>, scale: Vec<f64> },
}

impl Scaler {
    pub(crate) fn validate(&self) -> Result<(), ClassifierLoadError> {
        let (a, b) = match self {
            Scaler::Standard { mean, scale } => (("scaler.mean", mean), ("scaler.scale", scale)),
            Scaler::MinMax { min, scale } => (("scaler.min", min), ("scaler.scale", scale)),
        };
        for (field, values) in [a, b] {
            if values.len() != FEATURE_COUNT {
                return Err(ClassifierLoadError::Shape {
                    field,
                    expected: FEATURE_COUNT,
                    actual: values.len(),
                });
            }
            if values.iter().any(|v| !v.is_finite()) {
                return Err(ClassifierLoadError::Invalid(format!(
                    "{} contains a non-finite value",
                    field
                )));
            }
        }
        Ok(())
    }

    /// Applies the transform elementwise.
    pub fn transform(&self, vector: &FeatureVector) -> [f64; FEATURE_COUNT] {
        let x = vector.as_array();
        let mut out = [0.0; FEATURE_COUNT];
        match self {
            Scaler::Standard { mean, scale } => {
                for i in 0..FEATURE_COUNT {
                    // A constant training column has scale 0; it is left unscaled.
                    let s = if scale[i] == 0.0 { 1.0 } else { scale[i] };
                    out[i] = (x[i] - mean[i]) / s;
                }
            }
            Scaler::MinMax { min, scale } => {
                for i in 0..FEATURE_COUNT {
                    out[i] = x[i] * scale[i] + min[i];
                }
            }
        }
        out
    }
}
