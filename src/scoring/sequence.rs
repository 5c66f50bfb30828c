//! Logistic sequence model.
//!
//! A trained artifact stores per-feature normalisation and one weight per
//! (time step, feature) pair. Inference is a weighted sum over the
//! normalised window plus a bias, squashed through a sigmoid:
//!
//! ```text
//! p = σ(bias + Σ_t Σ_f w[t][f] · (x[t][f] − mean[f]) / std[f])
//! ```
//!
//! Artifact format (TOML):
//!
//! ```toml
//! name = "flood-risk-logistic"
//! version = "v1.0"
//! window_len = 7
//! bias = -2.0
//! feature_mean = [30.0, 65.0, 60.0]
//! feature_std = [25.0, 18.0, 30.0]
//! weights = [[0.04, 0.02, 0.06], ...]   # window_len rows, oldest first
//! ```

use serde::Deserialize;
use std::fs;
use std::path::Path;

use super::features::{FEATURE_NAMES, FeatureSequence};
use super::RiskModel;
use crate::model::FloodError;

#[derive(Debug, Clone, Deserialize)]
pub struct SequenceModel {
    pub name: String,
    pub version: String,
    pub window_len: usize,
    pub bias: f64,
    pub feature_mean: [f64; 3],
    pub feature_std: [f64; 3],
    pub weights: Vec<[f64; 3]>,
}

impl SequenceModel {
    /// Loads and checks an artifact file.
    pub fn load(path: &Path) -> Result<Self, FloodError> {
        let text = fs::read_to_string(path).map_err(|e| {
            FloodError::Configuration(format!("model artifact {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, FloodError> {
        let model: SequenceModel = toml::from_str(text)
            .map_err(|e| FloodError::Configuration(format!("invalid model artifact: {}", e)))?;
        model.check()?;
        Ok(model)
    }

    fn check(&self) -> Result<(), FloodError> {
        if self.window_len == 0 || self.weights.len() != self.window_len {
            return Err(FloodError::Configuration(format!(
                "model '{}' has {} weight rows for window_len {}",
                self.name,
                self.weights.len(),
                self.window_len
            )));
        }
        for (i, std) in self.feature_std.iter().enumerate() {
            if !(std.is_finite() && *std > 0.0) {
                return Err(FloodError::Configuration(format!(
                    "model '{}' has non-positive std for {}",
                    self.name, FEATURE_NAMES[i]
                )));
            }
        }
        let all_finite = self.bias.is_finite()
            && self.feature_mean.iter().all(|m| m.is_finite())
            && self.weights.iter().flatten().all(|w| w.is_finite());
        if !all_finite {
            return Err(FloodError::Configuration(format!(
                "model '{}' contains non-finite parameters",
                self.name
            )));
        }
        Ok(())
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl RiskModel for SequenceModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict(&self, features: &FeatureSequence) -> Result<f64, String> {
        if features.len() != self.window_len {
            return Err(format!(
                "model '{}' expects {} time steps, got {}",
                self.name,
                self.window_len,
                features.len()
            ));
        }

        let mut z = self.bias;
        for (row, weights) in features.rows().iter().zip(&self.weights) {
            for f in 0..3 {
                let normalised = (row[f] - self.feature_mean[f]) / self.feature_std[f];
                z += weights[f] * normalised;
            }
        }
        Ok(sigmoid(z))
    }

    fn window_len(&self) -> Option<usize> {
        Some(self.window_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTIFACT: &str = r#"
        name = "test-logistic"
        version = "v0"
        window_len = 2
        bias = 0.0
        feature_mean = [0.0, 0.0, 0.0]
        feature_std = [1.0, 1.0, 1.0]
        weights = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]
    "#;

    #[test]
    fn test_zero_input_gives_sigmoid_of_bias() {
        let model = SequenceModel::from_toml_str(ARTIFACT).unwrap();
        let p = model.predict(&FeatureSequence::from_rows(vec![[0.0; 3], [0.0; 3]])).unwrap();
        assert!((p - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_weighted_feature_moves_probability() {
        let model = SequenceModel::from_toml_str(ARTIFACT).unwrap();
        let p = model
            .predict(&FeatureSequence::from_rows(vec![[0.0; 3], [2.0, 0.0, 0.0]]))
            .unwrap();
        assert!((p - sigmoid(2.0)).abs() < 1e-12);
        assert!(p > 0.85);
    }

    #[test]
    fn test_wrong_sequence_length_is_an_error() {
        let model = SequenceModel::from_toml_str(ARTIFACT).unwrap();
        assert!(model.predict(&FeatureSequence::from_rows(vec![[0.0; 3]])).is_err());
    }

    #[test]
    fn test_weight_rows_must_match_window_len() {
        let bad = ARTIFACT.replace("window_len = 2", "window_len = 3");
        assert!(matches!(
            SequenceModel::from_toml_str(&bad),
            Err(FloodError::Configuration(_))
        ));
    }

    #[test]
    fn test_zero_std_is_rejected() {
        let bad = ARTIFACT.replace("feature_std = [1.0, 1.0, 1.0]", "feature_std = [1.0, 0.0, 1.0]");
        assert!(SequenceModel::from_toml_str(&bad).is_err());
    }

    #[test]
    fn test_missing_artifact_is_a_configuration_error() {
        let result = SequenceModel::load(Path::new("/nonexistent/flood_model.toml"));
        assert!(matches!(result, Err(FloodError::Configuration(_))));
    }

    #[test]
    fn test_bundled_artifact_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("models/flood_risk_v1.toml");
        let model = SequenceModel::load(&path).expect("bundled artifact should be valid");
        assert_eq!(RiskModel::window_len(&model), Some(7));

        let calm = FeatureSequence::from_rows(vec![[5.0, 55.0, 40.0]; 7]);
        let storm = FeatureSequence::from_rows(vec![[150.0, 95.0, 250.0]; 7]);
        let p_calm = model.predict(&calm).unwrap();
        let p_storm = model.predict(&storm).unwrap();
        assert!(p_calm < 0.30, "calm week should be GREEN, got {}", p_calm);
        assert!(p_storm >= 0.70, "storm week should be RED, got {}", p_storm);
    }
}
