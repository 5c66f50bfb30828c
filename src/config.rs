/// Service configuration loaded from a TOML file.
///
/// Every key has a default so an empty file is a valid configuration. The
/// file path comes from `FLOODWATCH_CONFIG` (a `.env` file is honoured) and
/// falls back to `./floodwatch.toml`.

use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::logging::LogLevel;
use crate::model::FloodError;
use crate::sites::{self, Site, SiteRegistry};

pub const DEFAULT_CONFIG_PATH: &str = "./floodwatch.toml";

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Readings per scoring window (seven daily samples).
    pub window_len: usize,
    /// Largest allowed gap between consecutive readings before the window resets.
    pub max_gap_secs: i64,
    /// Upper bound on one model inference call.
    pub scoring_timeout_ms: u64,
    /// Extra attempts after a failed or timed-out inference.
    pub scoring_retries: u32,
    /// Worker threads for the site dispatcher.
    pub workers: usize,
    /// Age of the last reading after which a scored site is reported stale.
    pub stale_after_secs: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_len: 7,
            max_gap_secs: 2 * 86_400,
            scoring_timeout_ms: 2_000,
            scoring_retries: 1,
            workers: 4,
            stale_after_secs: 2 * 86_400,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub yellow_threshold: f64,
    pub red_threshold: f64,
    /// Consecutive sub-threshold scores required before de-escalating.
    pub deescalation_confirmations: u32,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            yellow_threshold: 0.30,
            red_threshold: 0.70,
            deescalation_confirmations: 2,
        }
    }
}

/// Accepted physical ranges for each reading field (inclusive).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub water_level_cm_max: f64,
    pub rainfall_mm_max: f64,
    pub soil_moisture_pct_min: f64,
    pub soil_moisture_pct_max: f64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            water_level_cm_max: 1_000.0,
            rainfall_mm_max: 200.0,
            soil_moisture_pct_min: 0.0,
            soil_moisture_pct_max: 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelEngine {
    Sequence,
    Heuristic,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub engine: ModelEngine,
    pub artifact: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            engine: ModelEngine::Sequence,
            artifact: PathBuf::from("./models/flood_risk_v1.toml"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub base_url: String,
    pub poll_interval_secs: u64,
    pub timeout_secs: u64,
    /// Dashboard endpoint that receives alert records; disabled when empty.
    pub dashboard_url: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            poll_interval_secs: 1_800,
            timeout_secs: 30,
            dashboard_url: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub console_timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            console_timestamps: true,
        }
    }
}

impl LoggingConfig {
    pub fn min_level(&self) -> LogLevel {
        match self.level.to_ascii_lowercase().as_str() {
            "debug" => LogLevel::Debug,
            "warn" | "warning" => LogLevel::Warning,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

// ---------------------------------------------------------------------------
// Top level
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub alert: AlertConfig,
    pub limits: LimitsConfig,
    pub model: ModelConfig,
    pub gateway: GatewayConfig,
    pub logging: LoggingConfig,
    pub sites: Vec<Site>,
}

impl Config {
    /// Parses a TOML document and validates it.
    pub fn from_toml_str(text: &str) -> Result<Self, FloodError> {
        let config: Config = toml::from_str(text)
            .map_err(|e| FloodError::Configuration(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates the config file at `path`.
    pub fn load(path: &Path) -> Result<Self, FloodError> {
        let text = fs::read_to_string(path).map_err(|e| {
            FloodError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Loads `.env`, then the file named by `FLOODWATCH_CONFIG`, or the
    /// default path. A missing default file yields the built-in defaults.
    pub fn load_from_env() -> Result<Self, FloodError> {
        dotenv::dotenv().ok();
        match env::var("FLOODWATCH_CONFIG") {
            Ok(path) => Self::load(Path::new(&path)),
            Err(_) => {
                let default_path = Path::new(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    Self::load(default_path)
                } else {
                    let config = Config::default();
                    config.validate()?;
                    Ok(config)
                }
            }
        }
    }

    /// Rejects values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), FloodError> {
        let fail = |msg: String| Err(FloodError::Configuration(msg));

        let a = &self.alert;
        if !(0.0 < a.yellow_threshold && a.yellow_threshold < a.red_threshold && a.red_threshold <= 1.0) {
            return fail(format!(
                "thresholds must satisfy 0 < yellow ({}) < red ({}) <= 1",
                a.yellow_threshold, a.red_threshold
            ));
        }
        if a.deescalation_confirmations == 0 {
            return fail("deescalation_confirmations must be at least 1".to_string());
        }

        let p = &self.pipeline;
        if p.window_len == 0 {
            return fail("window_len must be at least 1".to_string());
        }
        if p.max_gap_secs <= 0 || p.stale_after_secs <= 0 {
            return fail("max_gap_secs and stale_after_secs must be positive".to_string());
        }
        if p.scoring_timeout_ms == 0 {
            return fail("scoring_timeout_ms must be positive".to_string());
        }
        if p.workers == 0 {
            return fail("workers must be at least 1".to_string());
        }

        let l = &self.limits;
        if l.water_level_cm_max <= 0.0
            || l.rainfall_mm_max <= 0.0
            || l.soil_moisture_pct_min < 0.0
            || l.soil_moisture_pct_max > 100.0
            || l.soil_moisture_pct_min >= l.soil_moisture_pct_max
        {
            return fail("reading limits are inconsistent".to_string());
        }

        // Duplicate / malformed ids surface here rather than at first use.
        self.registry().map(|_| ())
    }

    /// Builds the site registry, falling back to the built-in sites.
    pub fn registry(&self) -> Result<SiteRegistry, FloodError> {
        if self.sites.is_empty() {
            SiteRegistry::new(sites::default_sites())
        } else {
            SiteRegistry::new(self.sites.clone())
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_yields_documented_defaults() {
        let config = Config::from_toml_str("").expect("empty config should be valid");
        assert_eq!(config.pipeline.window_len, 7);
        assert_eq!(config.alert.yellow_threshold, 0.30);
        assert_eq!(config.alert.red_threshold, 0.70);
        assert_eq!(config.alert.deescalation_confirmations, 2);
        assert_eq!(config.model.engine, ModelEngine::Sequence);
        assert_eq!(config.registry().unwrap().len(), 5, "built-in sites apply");
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = Config::from_toml_str(
            r#"
            [pipeline]
            max_gap_secs = 3600

            [model]
            engine = "heuristic"

            [[sites]]
            id = "TEST01"
            name = "Test Creek"
            latitude = -23.0
            longitude = -46.0
            "#,
        )
        .expect("partial config should parse");
        assert_eq!(config.pipeline.max_gap_secs, 3600);
        assert_eq!(config.pipeline.window_len, 7);
        assert_eq!(config.model.engine, ModelEngine::Heuristic);
        let registry = config.registry().unwrap();
        assert_eq!(registry.all_site_ids(), vec!["TEST01"]);
    }

    #[test]
    fn test_inverted_thresholds_are_rejected() {
        let result = Config::from_toml_str(
            r#"
            [alert]
            yellow_threshold = 0.8
            red_threshold = 0.5
            "#,
        );
        assert!(matches!(result, Err(FloodError::Configuration(_))));
    }

    #[test]
    fn test_zero_confirmations_is_rejected() {
        let result = Config::from_toml_str("[alert]\ndeescalation_confirmations = 0\n");
        assert!(matches!(result, Err(FloodError::Configuration(_))));
    }

    #[test]
    fn test_duplicate_sites_are_rejected_at_load() {
        let result = Config::from_toml_str(
            r#"
            [[sites]]
            id = "A1"
            name = "one"
            latitude = 0.0
            longitude = 0.0

            [[sites]]
            id = "A1"
            name = "two"
            latitude = 0.0
            longitude = 0.0
            "#,
        );
        assert!(matches!(result, Err(FloodError::Configuration(_))));
    }

    #[test]
    fn test_unknown_engine_is_a_configuration_error() {
        let result = Config::from_toml_str("[model]\nengine = \"lstm\"\n");
        assert!(matches!(result, Err(FloodError::Configuration(_))));
    }

    #[test]
    fn test_log_level_parsing() {
        let mut logging = LoggingConfig::default();
        assert_eq!(logging.min_level(), LogLevel::Info);
        logging.level = "WARN".to_string();
        assert_eq!(logging.min_level(), LogLevel::Warning);
        logging.level = "debug".to_string();
        assert_eq!(logging.min_level(), LogLevel::Debug);
    }

    #[test]
    fn test_bundled_config_file_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("floodwatch.toml");
        let config = Config::load(&path).expect("bundled floodwatch.toml should be valid");
        assert_eq!(config.sites.len(), 5);
        assert_eq!(config.pipeline.window_len, 7);
        assert_eq!(config.model.engine, ModelEngine::Sequence);
    }

    #[test]
    fn test_missing_file_is_a_configuration_error() {
        let result = Config::load(Path::new("/nonexistent/floodwatch.toml"));
        assert!(matches!(result, Err(FloodError::Configuration(_))));
    }
}
