/// Pipeline orchestrator.
///
/// Wires validator → window → scorer → classifier for every incoming reading
/// and owns the per-site state map. One orchestrator serves many sites, but
/// each site is only ever touched by the orchestrator that owns it, so
/// per-site processing is strictly serial.
///
/// Per-site phases:
///
/// ```text
/// AwaitingData ─first reading─▶ Accumulating ─window full─▶ Ready ─scored─▶ Scored
///                                    ▲                                       │
///                                    └──────────── gap reset ────────────────┘
/// ```
///
/// Rejected readings never change a site's phase. A refused score leaves the
/// alert state as it was and the site stays `Ready` until the next reading.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::alert::{self, AlertClassifier, stalenesses};
use crate::config::{Config, PipelineConfig};
use crate::logging::{self, Component};
use crate::model::{
    AlertEvent, AlertRecord, AlertState, AlertStatus, FloodError, RawReading, Reading,
};
use crate::scoring::{RiskModel, Scorer};
use crate::sites::SiteRegistry;
use crate::store::StateStore;
use crate::validate::Validator;
use crate::window::{SiteWindow, WindowStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SitePhase {
    AwaitingData,
    Accumulating,
    Ready,
    Scored,
}

impl fmt::Display for SitePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SitePhase::AwaitingData => write!(f, "AWAITING_DATA"),
            SitePhase::Accumulating => write!(f, "ACCUMULATING"),
            SitePhase::Ready => write!(f, "READY"),
            SitePhase::Scored => write!(f, "SCORED"),
        }
    }
}

/// What happened to an accepted reading.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestOutcome {
    pub site_id: String,
    pub phase: SitePhase,
    /// Readings held in the window after the append.
    pub window_len: usize,
    /// Gap in seconds, when this reading reset the window.
    pub gap_reset: Option<i64>,
    /// Record to publish. `Live` after a successful score, `ScoringUnavailable`
    /// when scoring was refused for a site that already has an alert.
    pub alert: Option<AlertRecord>,
}

#[derive(Debug, Clone)]
struct SiteState {
    window: SiteWindow,
    phase: SitePhase,
    last_accepted: Option<DateTime<Utc>>,
    alert: Option<AlertState>,
    stale_flagged: bool,
}

impl SiteState {
    fn new(config: &PipelineConfig) -> Self {
        Self {
            window: SiteWindow::new(config.window_len, config.max_gap_secs),
            phase: SitePhase::AwaitingData,
            last_accepted: None,
            alert: None,
            stale_flagged: false,
        }
    }
}

pub struct Orchestrator {
    config: PipelineConfig,
    registry: Arc<SiteRegistry>,
    validator: Validator,
    scorer: Scorer,
    classifier: AlertClassifier,
    sites: HashMap<String, SiteState>,
    store: Box<dyn StateStore>,
}

impl Orchestrator {
    pub fn new(
        config: &Config,
        registry: Arc<SiteRegistry>,
        model: Arc<dyn RiskModel>,
        store: Box<dyn StateStore>,
    ) -> Self {
        Self {
            config: config.pipeline.clone(),
            validator: Validator::new(Arc::clone(&registry), config.limits.clone()),
            scorer: Scorer::from_config(model, &config.pipeline),
            classifier: AlertClassifier::from_config(&config.alert),
            registry,
            sites: HashMap::new(),
            store,
        }
    }

    // -----------------------------------------------------------------------
    // Restart
    // -----------------------------------------------------------------------

    /// Restores every registered site. Returns how many had persisted state.
    pub fn restore_all(&mut self) -> Result<usize, FloodError> {
        let ids: Vec<String> = self
            .registry
            .all_site_ids()
            .into_iter()
            .map(str::to_string)
            .collect();
        let mut restored = 0;
        for id in &ids {
            if self.restore_site(id)? {
                restored += 1;
            }
        }
        Ok(restored)
    }

    /// Loads the last accepted timestamp and alert state for one site and
    /// re-warms its window from the most recent contiguous readings.
    ///
    /// Returns `false` when the store knows nothing about the site.
    pub fn restore_site(&mut self, site_id: &str) -> Result<bool, FloodError> {
        if !self.registry.contains(site_id) {
            return Err(FloodError::Configuration(format!(
                "cannot restore unknown site '{}'",
                site_id
            )));
        }

        let persisted = self.store.load_site(site_id)?;
        if persisted.last_accepted.is_none() && persisted.alert.is_none() {
            return Ok(false);
        }

        let recent = self.store.recent_readings(site_id, self.config.window_len)?;
        let mut state = SiteState::new(&self.config);
        for reading in contiguous_tail(recent, self.config.max_gap_secs) {
            state.window.append(reading);
        }
        state.last_accepted = persisted.last_accepted;
        state.alert = persisted.alert;
        state.phase = match (state.window.status(), state.alert.is_some()) {
            (WindowStatus::Complete, true) => SitePhase::Scored,
            (WindowStatus::Complete, false) => SitePhase::Ready,
            _ if state.last_accepted.is_some() => SitePhase::Accumulating,
            _ => SitePhase::AwaitingData,
        };

        logging::info(
            Component::Pipeline,
            Some(site_id),
            &format!(
                "restored: {} readings buffered, phase {}, tier {}",
                state.window.len(),
                state.phase,
                state
                    .alert
                    .as_ref()
                    .map_or_else(|| "none".to_string(), |a| a.tier.to_string())
            ),
        );
        self.sites.insert(site_id.to_string(), state);
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Ingestion
    // -----------------------------------------------------------------------

    /// Applies one raw reading.
    ///
    /// Validation and ordering failures are returned as errors and leave
    /// every piece of site state untouched. Gap resets and scoring refusals
    /// are recoverable: they are logged and reported through the outcome.
    pub fn ingest(&mut self, raw: &RawReading) -> Result<IngestOutcome, FloodError> {
        let last = self
            .sites
            .get(raw.site_id.trim())
            .and_then(|s| s.last_accepted);

        let reading = match self.validator.validate(raw, last) {
            Ok(r) => r,
            Err(e) => {
                logging::log_failure("validate reading", &e);
                return Err(e);
            }
        };

        if let Err(e) = self.store.record_reading(&reading) {
            logging::log_failure("persist reading", &e);
        }

        let site_id = reading.site_id.clone();
        let timestamp = reading.timestamp;
        let config = &self.config;
        let state = self
            .sites
            .entry(site_id.clone())
            .or_insert_with(|| SiteState::new(config));

        state.last_accepted = Some(timestamp);
        state.stale_flagged = false;

        let appended = state.window.append(reading);
        if let Some(gap_secs) = appended.gap_reset {
            logging::log_failure(
                "buffer reading",
                &FloodError::Gap {
                    site_id: site_id.clone(),
                    gap_secs,
                    max_gap_secs: self.config.max_gap_secs,
                },
            );
            if let Some(alert) = state.alert.as_mut() {
                alert::reset_hysteresis(alert);
                if let Err(e) = self.store.save_alert(alert) {
                    logging::log_failure("persist alert state", &e);
                }
            }
        }

        let mut outcome = IngestOutcome {
            site_id: site_id.clone(),
            phase: SitePhase::Accumulating,
            window_len: state.window.len(),
            gap_reset: appended.gap_reset,
            alert: None,
        };

        if let WindowStatus::Accumulating { len, required } = appended.status {
            state.phase = SitePhase::Accumulating;
            logging::debug(
                Component::Buffer,
                Some(&site_id),
                &format!("accumulating {}/{}", len, required),
            );
            return Ok(outcome);
        }

        state.phase = SitePhase::Ready;
        outcome.phase = SitePhase::Ready;

        match self.scorer.score(&state.window.snapshot()) {
            Ok(score) => {
                let next = self.classifier.classify(
                    &site_id,
                    score.probability,
                    score.timestamp,
                    state.alert.as_ref(),
                );
                log_transition(state.alert.as_ref(), &next);

                if let Err(e) = self.store.save_alert(&next) {
                    logging::log_failure("persist alert state", &e);
                }
                if let Some(event) = AlertEvent::for_transition(state.alert.as_ref(), &next) {
                    match self.store.record_alert_event(&event) {
                        Ok(id) => logging::info(
                            Component::Store,
                            Some(&site_id),
                            &format!("alert #{} logged: {}", id, event),
                        ),
                        Err(e) => logging::log_failure("log alert event", &e),
                    }
                }

                outcome.alert = Some(alert::alert_record(
                    &next,
                    Some(score.confidence),
                    score.timestamp,
                    AlertStatus::Live,
                ));
                state.alert = Some(next);
                state.phase = SitePhase::Scored;
                outcome.phase = SitePhase::Scored;
            }
            Err(e) => {
                logging::log_failure("score window", &e);
                outcome.alert = state.alert.as_ref().map(|prev| {
                    alert::alert_record(prev, None, timestamp, AlertStatus::ScoringUnavailable)
                });
            }
        }

        Ok(outcome)
    }

    // -----------------------------------------------------------------------
    // Staleness
    // -----------------------------------------------------------------------

    /// Flags scored sites whose newest reading is older than
    /// `stale_after_secs` at `now`. Each silent episode is reported once;
    /// the next accepted reading re-arms the flag.
    pub fn sweep_stale(&mut self, now: DateTime<Utc>) -> Vec<AlertRecord> {
        let max_age = self.config.stale_after_secs;
        let mut records = Vec::new();

        let mut ids: Vec<&String> = self.sites.keys().collect();
        ids.sort();
        let ids: Vec<String> = ids.into_iter().cloned().collect();

        for id in ids {
            let Some(state) = self.sites.get_mut(&id) else {
                continue;
            };
            let (Some(last), Some(alert)) = (state.last_accepted, state.alert.as_ref()) else {
                continue;
            };
            if state.stale_flagged || !stalenesses::is_stale_at(last, max_age, now) {
                continue;
            }

            state.stale_flagged = true;
            logging::warn(
                Component::Pipeline,
                Some(&id),
                &format!(
                    "no reading for {}h; holding {} as stale",
                    stalenesses::age_secs(last, now) / 3600,
                    alert.tier
                ),
            );
            records.push(alert::alert_record(alert, None, now, AlertStatus::StaleData));
        }

        records
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Phase of a site; sites never seen are `AwaitingData`.
    pub fn phase(&self, site_id: &str) -> SitePhase {
        self.sites
            .get(site_id)
            .map_or(SitePhase::AwaitingData, |s| s.phase)
    }

    pub fn alert_state(&self, site_id: &str) -> Option<&AlertState> {
        self.sites.get(site_id).and_then(|s| s.alert.as_ref())
    }

    pub fn window_len(&self, site_id: &str) -> usize {
        self.sites.get(site_id).map_or(0, |s| s.window.len())
    }

    pub fn last_accepted(&self, site_id: &str) -> Option<DateTime<Utc>> {
        self.sites.get(site_id).and_then(|s| s.last_accepted)
    }

    pub fn is_stale_flagged(&self, site_id: &str) -> bool {
        self.sites.get(site_id).is_some_and(|s| s.stale_flagged)
    }

    pub fn registry(&self) -> &SiteRegistry {
        &self.registry
    }
}

fn log_transition(previous: Option<&AlertState>, next: &AlertState) {
    match previous {
        Some(prev) if prev.tier != next.tier => logging::info(
            Component::Classifier,
            Some(&next.site_id),
            &format!(
                "{} → {} (p = {:.2})",
                prev.tier, next.tier, next.last_probability
            ),
        ),
        Some(_) => logging::debug(
            Component::Classifier,
            Some(&next.site_id),
            &format!(
                "{} held (p = {:.2}, below-threshold count {})",
                next.tier, next.last_probability, next.below_threshold_count
            ),
        ),
        None => logging::info(
            Component::Classifier,
            Some(&next.site_id),
            &format!("initial tier {} (p = {:.2})", next.tier, next.last_probability),
        ),
    }
}

/// Trailing run of readings with no gap above `max_gap_secs`, oldest first.
fn contiguous_tail(readings: Vec<Reading>, max_gap_secs: i64) -> Vec<Reading> {
    let max_gap = Duration::seconds(max_gap_secs);
    let mut start = readings.len();
    while start > 0 {
        if start < readings.len() {
            let gap = readings[start].timestamp - readings[start - 1].timestamp;
            if gap > max_gap || gap <= Duration::zero() {
                break;
            }
        }
        start -= 1;
    }
    readings.into_iter().skip(start).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
