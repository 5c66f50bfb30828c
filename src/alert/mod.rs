//! Alert classification.
//!
//! Submodules:
//! - `thresholds`: probability → tier, with de-escalation hysteresis.
//! - `actions`: tier → recommended actions and the outgoing record.
//! - `stalenesses`: detection of sites that stopped reporting.

pub mod actions;
pub mod stalenesses;
pub mod thresholds;

pub use actions::{action_level, alert_record, recommended_actions};
pub use thresholds::{AlertClassifier, Thresholds, reset_hysteresis};
