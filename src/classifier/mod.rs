//! The pre-trained anomaly classifier.
//!
//! A [`ClassifierArtifact`] bundles the scaler, the isolation forest and the
//! clip ranges observed in training. It is read from a JSON file once at
//! startup, validated, and then shared read-only by the sampling loop.

pub mod forest;
pub mod scaler;

use crate::features::{ClipRange, ClipRanges, Feature, FeatureVector, FEATURE_COUNT};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub use forest::{IsolationForest, IsolationTree};
pub use scaler::Scaler;

/// Fatal errors raised while loading the classifier artifact.
#[derive(Error, Debug)]
pub enum ClassifierLoadError {
    #[error("failed to read classifier artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode classifier artifact: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("feature order mismatch at position {position}: expected '{expected}', found '{found}'")]
    FeatureOrder {
        position: usize,
        expected: &'static str,
        found: String,
    },

    #[error("{field} has {actual} entries, expected {expected}")]
    Shape {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("invalid tree {tree}: {reason}")]
    Tree { tree: usize, reason: String },

    #[error("invalid clip range for '{feature}': {reason}")]
    ClipRange { feature: String, reason: String },

    #[error("invalid classifier artifact: {0}")]
    Invalid(String),
}

/// Raw label produced by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Inlier,
    Outlier,
}

/// The trained model variants an artifact may carry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Model {
    IsolationForest(IsolationForest),
}

impl Model {
    fn validate(&self) -> Result<(), ClassifierLoadError> {
        match self {
            Model::IsolationForest(forest) => forest.validate(),
        }
    }

    fn predict(&self, x: &[f64; FEATURE_COUNT]) -> Label {
        match self {
            Model::IsolationForest(forest) => {
                if forest.decision_function(x) < 0.0 {
                    Label::Outlier
                } else {
                    Label::Inlier
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ArtifactFile {
    feature_names: Vec<String>,
    scaler: Scaler,
    model: Model,
    #[serde(default)]
    clip_ranges: BTreeMap<String, [f64; 2]>,
}

/// The immutable scaler + classifier pair.
#[derive(Debug, Clone)]
pub struct ClassifierArtifact {
    scaler: Scaler,
    model: Model,
    clip_ranges: ClipRanges,
}

impl ClassifierArtifact {
    /// Reads and validates an artifact file.
    pub fn load(path: &Path) -> Result<Self, ClassifierLoadError> {
        let content = std::fs::read_to_string(path).map_err(|source| ClassifierLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let artifact = Self::from_json(&content)?;
        info!(path = %path.display(), "Classifier artifact loaded");
        Ok(artifact)
    }

    /// Parses and validates an artifact from its JSON text.
    pub fn from_json(content: &str) -> Result<Self, ClassifierLoadError> {
        let file: ArtifactFile = serde_json::from_str(content)?;

        if file.feature_names.len() != FEATURE_COUNT {
            return Err(ClassifierLoadError::Shape {
                field: "feature_names",
                expected: FEATURE_COUNT,
                actual: file.feature_names.len(),
            });
        }
        for (position, (expected, found)) in Feature::ALL.iter().zip(&file.feature_names).enumerate() {
            if expected.name() != found {
                return Err(ClassifierLoadError::FeatureOrder {
                    position,
                    expected: expected.name(),
                    found: found.clone(),
                });
            }
        }

        file.scaler.validate()?;
        file.model.validate()?;
        let clip_ranges = parse_clip_ranges(&file.clip_ranges)?;
        debug!(overrides = file.clip_ranges.len(), "Clip ranges resolved");

        Ok(Self {
            scaler: file.scaler,
            model: file.model,
            clip_ranges,
        })
    }

    pub fn scaler(&self) -> &Scaler {
        &self.scaler
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn clip_ranges(&self) -> &ClipRanges {
        &self.clip_ranges
    }
}

fn parse_clip_ranges(raw: &BTreeMap<String, [f64; 2]>) -> Result<ClipRanges, ClassifierLoadError> {
    let mut overrides = BTreeMap::new();
    for (name, [min, max]) in raw {
        let feature = Feature::from_name(name).ok_or_else(|| ClassifierLoadError::ClipRange {
            feature: name.clone(),
            reason: "unknown feature".to_string(),
        })?;
        if !(min <= max) {
            return Err(ClassifierLoadError::ClipRange {
                feature: name.clone(),
                reason: format!("min {} is greater than max {}", min, max),
            });
        }
        overrides.insert(feature, ClipRange::new(*min, *max));
    }
    Ok(ClipRanges::with_overrides(&overrides))
}

/// Produces the binary anomaly flag for a feature vector.
///
/// Holds no mutable state; evaluating it any number of times needs no
/// synchronisation.
#[derive(Debug, Clone)]
pub struct AnomalyClassifier {
    artifact: ClassifierArtifact,
}

impl AnomalyClassifier {
    pub fn new(artifact: ClassifierArtifact) -> Self {
        Self { artifact }
    }

    pub fn artifact(&self) -> &ClassifierArtifact {
        &self.artifact
    }

    /// Scales the vector and evaluates the model.
    pub fn predict(&self, vector: &FeatureVector) -> Label {
        let scaled = self.artifact.scaler.transform(vector);
        self.artifact.model.predict(&scaled)
    }

    /// `true` when the model labels the vector an outlier.
    pub fn is_anomaly(&self, vector: &FeatureVector) -> bool {
        self.predict(vector) == Label::Outlier
    }
}
