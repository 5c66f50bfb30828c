/// Core data types for the flood early-warning service.
///
/// This module defines the shared domain model imported by all other modules:
/// readings as they arrive and once accepted, risk scores, alert tiers and the
/// per-site alert state, plus the service-wide error taxonomy.
///
/// It contains no I/O. Behaviour that belongs to a type (tier lookup,
/// hysteresis, range checks) lives with the module that owns that concern.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Reading types
// ---------------------------------------------------------------------------

/// One reading exactly as delivered by a field unit, before validation.
///
/// The timestamp is kept as the raw string so that an unparseable value can
/// be reported as a rejection rather than failing message decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawReading {
    #[serde(alias = "device_id", alias = "sensor_id")]
    pub site_id: String,
    pub timestamp: String,
    #[serde(alias = "water_level")]
    pub water_level_cm: f64,
    #[serde(alias = "rainfall")]
    pub rainfall_mm: f64,
    #[serde(alias = "soil_moisture")]
    pub soil_moisture_pct: f64,
}

/// An accepted reading. Only the validator constructs these; once accepted
/// a reading is never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub site_id: String,
    pub timestamp: DateTime<Utc>,
    pub water_level_cm: f64,
    pub rainfall_mm: f64,
    pub soil_moisture_pct: f64,
}

// ---------------------------------------------------------------------------
// Scoring types
// ---------------------------------------------------------------------------

/// Qualitative confidence attached to a probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// Output of one complete-window evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskScore {
    pub site_id: String,
    /// Timestamp of the newest reading in the scored window.
    pub timestamp: DateTime<Utc>,
    pub probability: f64,
    pub confidence: Confidence,
}

// ---------------------------------------------------------------------------
// Alert types
// ---------------------------------------------------------------------------

/// Alert severities, ordered GREEN < YELLOW < RED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    Green,
    Yellow,
    Red,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Green => write!(f, "GREEN"),
            Tier::Yellow => write!(f, "YELLOW"),
            Tier::Red => write!(f, "RED"),
        }
    }
}

/// The single live alert state of a site.
///
/// `below_threshold_count` and `pending_tier` carry the de-escalation
/// hysteresis: how many consecutive scores have fallen below the current
/// tier, and the highest tier seen among those scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertState {
    pub site_id: String,
    pub tier: Tier,
    /// When the site entered `tier`.
    pub since: DateTime<Utc>,
    pub last_probability: f64,
    pub below_threshold_count: u32,
    pub pending_tier: Option<Tier>,
    /// Timestamp of the last scored window that touched this state.
    pub updated_at: DateTime<Utc>,
}

/// Which family of actions a tier calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionLevel {
    MonitoringOnly,
    HeightenedAttention,
    EmergencyAction,
}

/// Freshness of an emitted alert record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    /// Produced by a scoring cycle that just completed.
    Live,
    /// The site has stopped reporting; the tier is the last known one.
    StaleData,
    /// Scoring was refused or failed; the tier is the last known one.
    ScoringUnavailable,
}

/// External-facing alert payload consumed by the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub site_id: String,
    pub tier: Tier,
    pub probability: f64,
    pub confidence: Option<Confidence>,
    pub action_level: ActionLevel,
    pub recommended_actions: Vec<String>,
    /// When the current tier took effect.
    pub changed_at: DateTime<Utc>,
    /// Timestamp of the reading (or sweep) that produced this record.
    pub evaluated_at: DateTime<Utc>,
    pub status: AlertStatus,
}

/// A tier change, kept in the alert log until an operator acknowledges it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub site_id: String,
    /// `None` when the site received its first tier.
    pub previous_tier: Option<Tier>,
    pub tier: Tier,
    pub probability: f64,
    /// Timestamp of the scored window that caused the change.
    pub raised_at: DateTime<Utc>,
}

impl AlertEvent {
    /// The event to log when `previous` becomes `next`, if the tier changed.
    pub fn for_transition(previous: Option<&AlertState>, next: &AlertState) -> Option<Self> {
        let previous_tier = previous.map(|p| p.tier);
        if previous_tier == Some(next.tier) {
            return None;
        }
        Some(AlertEvent {
            site_id: next.site_id.clone(),
            previous_tier,
            tier: next.tier,
            probability: next.last_probability,
            raised_at: next.since,
        })
    }

    pub fn is_escalation(&self) -> bool {
        self.previous_tier.is_none_or(|prev| self.tier > prev)
    }
}

impl fmt::Display for AlertEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.previous_tier {
            Some(prev) if self.is_escalation() => write!(
                f,
                "{} raised from {} to {} (p = {:.2})",
                self.site_id, prev, self.tier, self.probability
            ),
            Some(prev) => write!(
                f,
                "{} lowered from {} to {} (p = {:.2})",
                self.site_id, prev, self.tier, self.probability
            ),
            None => write!(
                f,
                "{} first classified {} (p = {:.2})",
                self.site_id, self.tier, self.probability
            ),
        }
    }
}

/// An alert log entry with its id and acknowledgement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedAlert {
    pub id: i64,
    #[serde(flatten)]
    pub event: AlertEvent,
    pub acknowledged_by: Option<String>,
    pub acknowledged_at: Option<DateTime<Utc>>,
}

impl LoggedAlert {
    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged_at.is_some()
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Why the validator turned a raw reading away.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    NonFinite {
        field: &'static str,
    },
    MalformedSiteId(String),
    UnknownSite(String),
    BadTimestamp(String),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::OutOfRange { field, value, min, max } => {
                write!(f, "{} = {} outside [{}, {}]", field, value, min, max)
            }
            Rejection::NonFinite { field } => write!(f, "{} is not a finite number", field),
            Rejection::MalformedSiteId(id) => write!(f, "malformed site id '{}'", id),
            Rejection::UnknownSite(id) => write!(f, "unknown site '{}'", id),
            Rejection::BadTimestamp(ts) => write!(f, "unparseable timestamp '{}'", ts),
        }
    }
}

/// Errors raised anywhere in the pipeline.
///
/// Every variant except `Configuration` is local to one site and recoverable.
#[derive(Debug, Clone, PartialEq)]
pub enum FloodError {
    /// Malformed or out-of-range reading; discarded.
    Validation(Rejection),
    /// Duplicate or out-of-order timestamp; discarded.
    Ordering {
        site_id: String,
        last_accepted: DateTime<Utc>,
        received: DateTime<Utc>,
    },
    /// Inter-sample gap above the configured maximum; the window was reset.
    Gap {
        site_id: String,
        gap_secs: i64,
        max_gap_secs: i64,
    },
    /// Model inference refused, failed or timed out; prior alert retained.
    ScoringUnavailable { site_id: String, reason: String },
    /// Unknown site, bad config or missing model artifact at startup.
    Configuration(String),
    /// Persistence collaborator failure.
    Storage(String),
    /// Ingestion gateway or alert sink failure.
    Transport(String),
}

impl FloodError {
    /// Only configuration problems abort the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FloodError::Configuration(_))
    }

    /// Site this error concerns, if any.
    pub fn site_id(&self) -> Option<&str> {
        match self {
            FloodError::Validation(Rejection::MalformedSiteId(id))
            | FloodError::Validation(Rejection::UnknownSite(id)) => Some(id),
            FloodError::Ordering { site_id, .. }
            | FloodError::Gap { site_id, .. }
            | FloodError::ScoringUnavailable { site_id, .. } => Some(site_id),
            _ => None,
        }
    }
}

impl fmt::Display for FloodError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FloodError::Validation(rejection) => write!(f, "Validation error: {}", rejection),
            FloodError::Ordering { site_id, last_accepted, received } => write!(
                f,
                "Ordering error for site {}: {} is not after {}",
                site_id,
                received.to_rfc3339(),
                last_accepted.to_rfc3339()
            ),
            FloodError::Gap { site_id, gap_secs, max_gap_secs } => write!(
                f,
                "Gap for site {}: {}s between readings exceeds {}s",
                site_id, gap_secs, max_gap_secs
            ),
            FloodError::ScoringUnavailable { site_id, reason } => {
                write!(f, "Scoring unavailable for site {}: {}", site_id, reason)
            }
            FloodError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            FloodError::Storage(msg) => write!(f, "Storage error: {}", msg),
            FloodError::Transport(msg) => write!(f, "Transport error: {}", msg),
        }
    }
}

impl std::error::Error for FloodError {}

impl From<Rejection> for FloodError {
    fn from(rejection: Rejection) -> Self {
        FloodError::Validation(rejection)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
