//! Rule-based fallback engine.
//!
//! Scores only the newest reading in the window with fixed additive rules.
//! Used when no trained artifact is deployed.

use super::features::{FeatureSequence, RAINFALL, SOIL_MOISTURE, WATER_LEVEL};
use super::RiskModel;

pub const RAINFALL_TRIGGER_MM: f64 = 15.0;
pub const WATER_LEVEL_TRIGGER_CM: f64 = 80.0;
pub const SOIL_MOISTURE_TRIGGER_PCT: f64 = 90.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicModel;

impl RiskModel for HeuristicModel {
    fn name(&self) -> &str {
        "heuristic-rules"
    }

    fn predict(&self, features: &FeatureSequence) -> Result<f64, String> {
        let row = features.latest().ok_or_else(|| "empty feature sequence".to_string())?;

        let mut probability: f64 = 0.0;
        if row[RAINFALL] > RAINFALL_TRIGGER_MM {
            probability += 0.3;
        }
        if row[WATER_LEVEL] > WATER_LEVEL_TRIGGER_CM {
            probability += 0.4;
        }
        if row[SOIL_MOISTURE] > SOIL_MOISTURE_TRIGGER_PCT {
            probability += 0.2;
        }
        Ok(probability.min(1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn predict(rain: f64, soil: f64, water: f64) -> f64 {
        HeuristicModel
            .predict(&FeatureSequence::from_rows(vec![[0.0; 3], [rain, soil, water]]))
            .unwrap()
    }

    #[test]
    fn test_quiet_reading_scores_zero() {
        assert_eq!(predict(2.0, 50.0, 40.0), 0.0);
    }

    #[test]
    fn test_rules_are_additive() {
        assert!((predict(25.3, 50.0, 40.0) - 0.3).abs() < 1e-12);
        assert!((predict(25.3, 50.0, 82.7) - 0.7).abs() < 1e-12);
        assert!((predict(25.3, 95.2, 82.7) - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_triggers_are_strict_inequalities() {
        assert_eq!(predict(15.0, 90.0, 80.0), 0.0);
    }

    #[test]
    fn test_only_latest_row_counts() {
        let features = FeatureSequence::from_rows(vec![[100.0, 99.0, 300.0], [0.0, 10.0, 10.0]]);
        assert_eq!(HeuristicModel.predict(&features).unwrap(), 0.0);
    }

    #[test]
    fn test_empty_sequence_is_an_error() {
        assert!(HeuristicModel.predict(&FeatureSequence::from_rows(Vec::new())).is_err());
    }
}
