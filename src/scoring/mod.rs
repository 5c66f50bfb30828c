//! Flood risk scoring.
//!
//! The risk model is a black box behind [`RiskModel`]: a feature sequence
//! goes in, a probability comes out. [`Scorer`] wraps a shared model with
//! the pipeline's contract: only complete, regular windows are scored, each
//! inference is bounded by a timeout, and any failure is a refusal rather
//! than a guess.
//!
//! Submodules:
//! - `features`: window → feature rows.
//! - `sequence`: logistic sequence model loaded from a TOML artifact.
//! - `heuristic`: rule-based fallback on the latest reading.

pub mod features;
pub mod heuristic;
pub mod sequence;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::{ModelConfig, ModelEngine, PipelineConfig};
use crate::logging::{self, Component};
use crate::model::{Confidence, FloodError, RiskScore};
use crate::window::Window;

pub use features::FeatureSequence;
pub use heuristic::HeuristicModel;
pub use sequence::SequenceModel;

/// Capability interface for an inference engine.
///
/// Implementations must be pure: the same sequence always yields the same
/// probability. They are loaded once and shared read-only by every worker.
pub trait RiskModel: Send + Sync {
    fn name(&self) -> &str;

    /// Returns a flood probability for the sequence, or a reason it cannot.
    fn predict(&self, features: &FeatureSequence) -> Result<f64, String>;

    /// Sequence length the engine was trained on, if it needs a fixed one.
    fn window_len(&self) -> Option<usize> {
        None
    }
}

/// Loads the engine selected in config. A missing or invalid artifact is a
/// configuration error.
pub fn load_model(config: &ModelConfig) -> Result<Arc<dyn RiskModel>, FloodError> {
    match config.engine {
        ModelEngine::Sequence => Ok(Arc::new(SequenceModel::load(&config.artifact)?)),
        ModelEngine::Heuristic => Ok(Arc::new(HeuristicModel)),
    }
}

/// Checks that `model` can score windows of `window_len` readings.
pub fn check_window_len(model: &dyn RiskModel, window_len: usize) -> Result<(), FloodError> {
    match model.window_len() {
        Some(expected) if expected != window_len => Err(FloodError::Configuration(format!(
            "model '{}' expects {} readings per window but pipeline.window_len is {}",
            model.name(),
            expected,
            window_len
        ))),
        _ => Ok(()),
    }
}

/// Qualitative confidence from the distance to a coin flip.
pub fn confidence_for(probability: f64) -> Confidence {
    let margin = (probability - 0.5).abs();
    if margin >= 0.3 {
        Confidence::High
    } else if margin >= 0.1 {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

/// Inference threads a scorer (and its clones) may have running at once.
pub const MAX_IN_FLIGHT_INFERENCES: usize = 4;

/// Releases an in-flight slot when the inference thread finishes, even if
/// the model panicked.
struct InFlightSlot(Arc<AtomicUsize>);

impl Drop for InFlightSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Clone)]
pub struct Scorer {
    model: Arc<dyn RiskModel>,
    timeout: Duration,
    retries: u32,
    in_flight: Arc<AtomicUsize>,
}

impl Scorer {
    pub fn new(model: Arc<dyn RiskModel>, timeout: Duration, retries: u32) -> Self {
        Self {
            model,
            timeout,
            retries,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn from_config(model: Arc<dyn RiskModel>, config: &PipelineConfig) -> Self {
        Self::new(
            model,
            Duration::from_millis(config.scoring_timeout_ms),
            config.scoring_retries,
        )
    }

    /// Scores a complete window.
    ///
    /// Refuses incomplete or irregular windows without calling the model.
    /// Failed or timed-out inference is retried up to `retries` more times.
    pub fn score(&self, window: &Window) -> Result<RiskScore, FloodError> {
        let newest = match window.newest() {
            Some(r) => r,
            None => {
                return Err(FloodError::ScoringUnavailable {
                    site_id: String::new(),
                    reason: "window is empty".to_string(),
                });
            }
        };
        let site_id = newest.site_id.clone();

        if !window.is_complete() {
            return Err(FloodError::ScoringUnavailable {
                site_id,
                reason: format!(
                    "window incomplete or irregular ({}/{} readings)",
                    window.len(),
                    window.required()
                ),
            });
        }

        let features = FeatureSequence::from_window(window);
        let mut reason = String::new();
        for attempt in 0..=self.retries {
            match self.infer(&features) {
                Ok(probability) => {
                    return Ok(RiskScore {
                        site_id,
                        timestamp: newest.timestamp,
                        probability,
                        confidence: confidence_for(probability),
                    });
                }
                Err(e) => {
                    logging::debug(
                        Component::Scorer,
                        Some(&site_id),
                        &format!("attempt {} of {} failed: {}", attempt + 1, self.retries + 1, e),
                    );
                    reason = e;
                }
            }
        }

        Err(FloodError::ScoringUnavailable { site_id, reason })
    }

    /// Inference threads currently running, timed-out ones included.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// One inference call on a helper thread, bounded by the timeout.
    ///
    /// A thread that times out cannot be cancelled and keeps running until
    /// the model returns. Such threads hold their slot, so a hung model
    /// exhausts `MAX_IN_FLIGHT_INFERENCES` and further calls are refused
    /// instead of spawning more threads.
    fn infer(&self, features: &FeatureSequence) -> Result<f64, String> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst);
        let slot = InFlightSlot(Arc::clone(&self.in_flight));
        if running >= MAX_IN_FLIGHT_INFERENCES {
            return Err(format!("{} inferences still running", running));
        }

        let (tx, rx) = mpsc::channel();
        let model = Arc::clone(&self.model);
        let features = features.clone();

        thread::Builder::new()
            .name("risk-inference".to_string())
            .spawn(move || {
                let _slot = slot;
                // Receiver may have timed out and gone away.
                let _ = tx.send(model.predict(&features));
            })
            .map_err(|e| format!("cannot start inference: {}", e))?;

        match rx.recv_timeout(self.timeout) {
            Ok(Ok(p)) if p.is_finite() && (0.0..=1.0).contains(&p) => Ok(p),
            Ok(Ok(p)) => Err(format!("model returned {} outside [0, 1]", p)),
            Ok(Err(e)) => Err(e),
            Err(RecvTimeoutError::Timeout) => {
                Err(format!("inference exceeded {} ms", self.timeout.as_millis()))
            }
            Err(RecvTimeoutError::Disconnected) => Err("inference thread panicked".to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Reading;
    use crate::window::SiteWindow;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Probability = latest water level / 100.
    struct WaterLevelModel;

    impl RiskModel for WaterLevelModel {
        fn name(&self) -> &str {
            "water-level"
        }
        fn predict(&self, features: &FeatureSequence) -> Result<f64, String> {
            let row = features.latest().ok_or("empty")?;
            Ok(row[features::WATER_LEVEL] / 100.0)
        }
    }

    struct SlowModel(u64);

    impl RiskModel for SlowModel {
        fn name(&self) -> &str {
            "slow"
        }
        fn predict(&self, _: &FeatureSequence) -> Result<f64, String> {
            std::thread::sleep(std::time::Duration::from_millis(self.0));
            Ok(0.5)
        }
    }

    /// Fails the first `failures` calls, then answers 0.4.
    struct FlakyModel {
        calls: AtomicUsize,
        failures: usize,
    }

    impl RiskModel for FlakyModel {
        fn name(&self) -> &str {
            "flaky"
        }
        fn predict(&self, _: &FeatureSequence) -> Result<f64, String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures { Err("transient".to_string()) } else { Ok(0.4) }
        }
    }

    struct BrokenModel;

    impl RiskModel for BrokenModel {
        fn name(&self) -> &str {
            "broken"
        }
        fn predict(&self, _: &FeatureSequence) -> Result<f64, String> {
            Ok(1.7)
        }
    }

    fn window_with(n: usize, water: f64) -> Window {
        let mut window = SiteWindow::new(7, 2 * 86_400);
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        for day in 0..n {
            window.append(Reading {
                site_id: "SP001".to_string(),
                timestamp: start + ChronoDuration::days(day as i64),
                water_level_cm: water,
                rainfall_mm: 10.0,
                soil_moisture_pct: 70.0,
            });
        }
        window.snapshot()
    }

    fn scorer(model: Arc<dyn RiskModel>) -> Scorer {
        Scorer::new(model, Duration::from_millis(100), 0)
    }

    #[test]
    fn test_complete_window_is_scored() {
        let score = scorer(Arc::new(WaterLevelModel)).score(&window_with(7, 72.0)).unwrap();
        assert_eq!(score.site_id, "SP001");
        assert!((score.probability - 0.72).abs() < 1e-12);
        assert_eq!(score.timestamp, Utc.with_ymd_and_hms(2025, 3, 7, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_scoring_is_deterministic_for_a_fixed_window() {
        let s = scorer(Arc::new(WaterLevelModel));
        let window = window_with(7, 35.0);
        let first = s.score(&window).unwrap();
        let second = s.score(&window).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_incomplete_window_is_refused_without_inference() {
        let result = scorer(Arc::new(WaterLevelModel)).score(&window_with(6, 90.0));
        match result {
            Err(FloodError::ScoringUnavailable { site_id, reason }) => {
                assert_eq!(site_id, "SP001");
                assert!(reason.contains("6/7"), "reason should report fill level: {}", reason);
            }
            other => panic!("expected refusal, got {:?}", other),
        }
    }

    #[test]
    fn test_timeout_is_a_refusal_not_a_crash() {
        let result = scorer(Arc::new(SlowModel(300))).score(&window_with(7, 50.0));
        assert!(matches!(result, Err(FloodError::ScoringUnavailable { .. })));
    }

    #[test]
    fn test_hung_model_cannot_pile_up_threads() {
        let s = Scorer::new(Arc::new(SlowModel(1_000)), Duration::from_millis(20), 0);
        let window = window_with(7, 50.0);
        for _ in 0..MAX_IN_FLIGHT_INFERENCES {
            assert!(s.score(&window).is_err());
        }
        assert_eq!(s.in_flight(), MAX_IN_FLIGHT_INFERENCES);

        match s.clone().score(&window) {
            Err(FloodError::ScoringUnavailable { reason, .. }) => {
                assert!(reason.contains("still running"), "unexpected reason: {}", reason);
            }
            other => panic!("expected refusal, got {:?}", other),
        }
        assert_eq!(s.in_flight(), MAX_IN_FLIGHT_INFERENCES, "refused calls spawn nothing");
    }

    #[test]
    fn test_finished_inference_releases_its_slot() {
        let s = scorer(Arc::new(WaterLevelModel));
        s.score(&window_with(7, 50.0)).unwrap();
        // The helper thread drops its slot right after sending the result.
        for _ in 0..50 {
            if s.in_flight() == 0 {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert_eq!(s.in_flight(), 0);
    }

    #[test]
    fn test_retry_recovers_from_transient_failure() {
        let model = Arc::new(FlakyModel { calls: AtomicUsize::new(0), failures: 1 });
        let s = Scorer::new(model, Duration::from_millis(500), 1);
        let score = s.score(&window_with(7, 50.0)).expect("second attempt should succeed");
        assert_eq!(score.probability, 0.4);
    }

    #[test]
    fn test_out_of_range_model_output_is_refused() {
        let result = scorer(Arc::new(BrokenModel)).score(&window_with(7, 50.0));
        assert!(matches!(result, Err(FloodError::ScoringUnavailable { .. })));
    }

    #[test]
    fn test_confidence_bands() {
        assert_eq!(confidence_for(0.5), Confidence::Low);
        assert_eq!(confidence_for(0.35), Confidence::Medium);
        assert_eq!(confidence_for(0.95), Confidence::High);
        assert_eq!(confidence_for(0.05), Confidence::High);
    }
}
