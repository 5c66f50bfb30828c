//! Startup preflight.
//!
//! Runs every check the service needs before it accepts a single reading:
//! the risk model loads and fits the configured window length, the site
//! registry is valid, and the state store answers. Any failed check aborts
//! startup as a configuration error.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use crate::config::Config;
use crate::logging::{self, Component};
use crate::model::FloodError;
use crate::scoring::{self, RiskModel};
use crate::sites::SiteRegistry;
use crate::store::StateStore;

// ============================================================================
// Verification Results
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum VerificationStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub name: &'static str,
    pub status: VerificationStatus,
    pub detail: String,
}

#[derive(Serialize)]
pub struct PreflightReport {
    pub timestamp: String,
    pub checks: Vec<CheckResult>,
    /// Loaded model, handed on to the pipeline so it is loaded exactly once.
    #[serde(skip)]
    pub model: Option<Arc<dyn RiskModel>>,
    #[serde(skip)]
    pub registry: Option<SiteRegistry>,
}

impl PreflightReport {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.status == VerificationStatus::Success)
    }

    pub fn failures(&self) -> Vec<&CheckResult> {
        self.checks
            .iter()
            .filter(|c| c.status == VerificationStatus::Failed)
            .collect()
    }

    /// The loaded model and registry, or a configuration error naming every
    /// failed check.
    pub fn into_startup(self) -> Result<(Arc<dyn RiskModel>, SiteRegistry), FloodError> {
        let failed: Vec<String> = self
            .failures()
            .iter()
            .map(|c| format!("{}: {}", c.name, c.detail))
            .collect();
        match (self.model, self.registry) {
            (Some(model), Some(registry)) if failed.is_empty() => Ok((model, registry)),
            _ => Err(FloodError::Configuration(format!(
                "preflight failed ({})",
                failed.join("; ")
            ))),
        }
    }
}

fn record<T>(
    checks: &mut Vec<CheckResult>,
    name: &'static str,
    result: Result<T, FloodError>,
    detail: impl FnOnce(&T) -> String,
) -> Option<T> {
    match result {
        Ok(value) => {
            checks.push(CheckResult {
                name,
                status: VerificationStatus::Success,
                detail: detail(&value),
            });
            Some(value)
        }
        Err(e) => {
            logging::log_failure(name, &e);
            checks.push(CheckResult {
                name,
                status: VerificationStatus::Failed,
                detail: e.to_string(),
            });
            None
        }
    }
}

// ============================================================================
// Preflight
// ============================================================================

pub fn preflight(config: &Config, store: &mut dyn StateStore) -> PreflightReport {
    let mut checks = Vec::new();

    let configuration = record(&mut checks, "configuration", config.validate(), |_| {
        "thresholds, limits and pipeline settings are consistent".to_string()
    });

    let registry = record(&mut checks, "site registry", config.registry(), |r| {
        format!("{} sites: {}", r.len(), r.all_site_ids().join(", "))
    });

    let loaded = scoring::load_model(&config.model).and_then(|m| {
        scoring::check_window_len(m.as_ref(), config.pipeline.window_len)?;
        Ok(m)
    });
    let model = record(&mut checks, "risk model", loaded, |m| {
        format!("engine '{}' loaded", m.name())
    });

    record(&mut checks, "state store", store.ping(), |_| "reachable".to_string());

    let report = PreflightReport {
        timestamp: Utc::now().to_rfc3339(),
        checks,
        model,
        registry: configuration.and(registry),
    };

    let level_message = format!(
        "preflight: {}/{} checks passed",
        report.checks.len() - report.failures().len(),
        report.checks.len()
    );
    if report.all_passed() {
        logging::info(Component::System, None, &level_message);
    } else {
        logging::error(Component::System, None, &level_message);
    }
    report
}

pub fn print_summary(report: &PreflightReport) {
    println!();
    println!("PREFLIGHT SUMMARY ({})", report.timestamp);
    println!("{}", "=".repeat(60));
    for check in &report.checks {
        let mark = match check.status {
            VerificationStatus::Success => "ok  ",
            VerificationStatus::Failed => "FAIL",
        };
        println!("[{}] {:<14} {}", mark, check.name, check.detail);
    }
    println!("{}", "=".repeat(60));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelEngine;
    use crate::store::MemoryStore;
    use std::path::PathBuf;

    struct DownStore;

    impl StateStore for DownStore {
        fn load_site(&mut self, _: &str) -> Result<crate::store::PersistedSite, FloodError> {
            Err(FloodError::Storage("down".into()))
        }
        fn record_reading(&mut self, _: &crate::model::Reading) -> Result<(), FloodError> {
            Err(FloodError::Storage("down".into()))
        }
        fn save_alert(&mut self, _: &crate::model::AlertState) -> Result<(), FloodError> {
            Err(FloodError::Storage("down".into()))
        }
        fn record_alert_event(&mut self, _: &crate::model::AlertEvent) -> Result<i64, FloodError> {
            Err(FloodError::Storage("down".into()))
        }
        fn recent_readings(
            &mut self,
            _: &str,
            _: usize,
        ) -> Result<Vec<crate::model::Reading>, FloodError> {
            Err(FloodError::Storage("down".into()))
        }
        fn ping(&mut self) -> Result<(), FloodError> {
            Err(FloodError::Storage("connection refused".into()))
        }
    }

    fn heuristic_config() -> Config {
        let mut config = Config::default();
        config.model.engine = ModelEngine::Heuristic;
        config
    }

    #[test]
    fn test_healthy_setup_passes_every_check() {
        let report = preflight(&heuristic_config(), &mut MemoryStore::new());
        assert!(report.all_passed(), "failures: {:?}", report.failures());
        assert_eq!(report.checks.len(), 4);
        let (model, registry) = report.into_startup().unwrap();
        assert_eq!(model.name(), "heuristic-rules");
        assert_eq!(registry.len(), 5);
    }

    #[test]
    fn test_missing_artifact_aborts_startup() {
        let mut config = Config::default();
        config.model.artifact = PathBuf::from("/nonexistent/model.toml");
        let report = preflight(&config, &mut MemoryStore::new());
        assert!(!report.all_passed());
        assert_eq!(report.failures()[0].name, "risk model");
        assert!(matches!(report.into_startup(), Err(FloodError::Configuration(_))));
    }

    fn bundled_artifact() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("models/flood_risk_v1.toml")
    }

    #[test]
    fn test_bundled_artifact_matches_default_window() {
        let mut config = Config::default();
        config.model.artifact = bundled_artifact();
        let report = preflight(&config, &mut MemoryStore::new());
        assert!(report.all_passed(), "failures: {:?}", report.failures());
    }

    #[test]
    fn test_artifact_window_mismatch_aborts_startup() {
        let mut config = Config::default();
        config.model.artifact = bundled_artifact();
        config.pipeline.window_len = 10;
        let report = preflight(&config, &mut MemoryStore::new());
        let failures = report.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].name, "risk model");
        assert!(failures[0].detail.contains("expects 7"), "detail: {}", failures[0].detail);
        assert!(matches!(report.into_startup(), Err(FloodError::Configuration(_))));
    }

    #[test]
    fn test_heuristic_engine_accepts_any_window() {
        let mut config = heuristic_config();
        config.pipeline.window_len = 10;
        assert!(preflight(&config, &mut MemoryStore::new()).all_passed());
    }

    #[test]
    fn test_unreachable_store_aborts_startup() {
        let report = preflight(&heuristic_config(), &mut DownStore);
        let failures = report.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].name, "state store");
        assert!(report.into_startup().is_err());
    }

    #[test]
    fn test_inconsistent_thresholds_abort_startup() {
        let mut config = heuristic_config();
        config.alert.yellow_threshold = 0.8;
        let report = preflight(&config, &mut MemoryStore::new());
        assert_eq!(report.failures()[0].name, "configuration");
        assert!(report.into_startup().is_err());
    }
}
