//! Shared fixtures for integration tests.
#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;

use floodwatch_service::config::Config;
use floodwatch_service::model::RawReading;
use floodwatch_service::pipeline::Orchestrator;
use floodwatch_service::scoring::features::WATER_LEVEL;
use floodwatch_service::scoring::{FeatureSequence, RiskModel};
use floodwatch_service::store::StateStore;

/// Probability = newest water level / 100, so tests dial in exact scores.
pub struct WaterLevelModel;

impl RiskModel for WaterLevelModel {
    fn name(&self) -> &str {
        "water-level"
    }

    fn predict(&self, features: &FeatureSequence) -> Result<f64, String> {
        let row = features.latest().ok_or("empty sequence")?;
        Ok(row[WATER_LEVEL] / 100.0)
    }
}

pub fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap() + Duration::days(n)
}

pub fn raw(site: &str, at: DateTime<Utc>, water: f64) -> RawReading {
    RawReading {
        site_id: site.to_string(),
        timestamp: at.to_rfc3339(),
        water_level_cm: water,
        rainfall_mm: 4.0,
        soil_moisture_pct: 55.0,
    }
}

pub fn orchestrator(config: &Config, store: Box<dyn StateStore>) -> Orchestrator {
    let registry = Arc::new(config.registry().expect("default registry is valid"));
    Orchestrator::new(config, registry, Arc::new(WaterLevelModel), store)
}
