//! Recommended actions and the external alert payload.
//!
//! Actions are a pure function of the tier; nothing here holds state.

use chrono::{DateTime, Utc};

use crate::model::{ActionLevel, AlertRecord, AlertState, AlertStatus, Confidence, Tier};

const GREEN_ACTIONS: &[&str] = &["Maintain routine monitoring"];

const YELLOW_ACTIONS: &[&str] = &[
    "Monitor weather bulletins",
    "Inspect drainage systems",
    "Notify emergency response teams",
];

const RED_ACTIONS: &[&str] = &[
    "Mobilize emergency response teams",
    "Consider preventive evacuation of critical areas",
    "Activate emergency protocols",
    "Notify local authorities",
];

pub fn action_level(tier: Tier) -> ActionLevel {
    match tier {
        Tier::Green => ActionLevel::MonitoringOnly,
        Tier::Yellow => ActionLevel::HeightenedAttention,
        Tier::Red => ActionLevel::EmergencyAction,
    }
}

pub fn recommended_actions(tier: Tier) -> &'static [&'static str] {
    match tier {
        Tier::Green => GREEN_ACTIONS,
        Tier::Yellow => YELLOW_ACTIONS,
        Tier::Red => RED_ACTIONS,
    }
}

/// Builds the dashboard-facing record for a state.
pub fn alert_record(
    state: &AlertState,
    confidence: Option<Confidence>,
    evaluated_at: DateTime<Utc>,
    status: AlertStatus,
) -> AlertRecord {
    AlertRecord {
        site_id: state.site_id.clone(),
        tier: state.tier,
        probability: state.last_probability,
        confidence,
        action_level: action_level(state.tier),
        recommended_actions: recommended_actions(state.tier)
            .iter()
            .map(|a| a.to_string())
            .collect(),
        changed_at: state.since,
        evaluated_at,
        status,
    }
}
