//! Persistence collaborators.
//!
//! Three seams:
//! - [`StateStore`]: what the live pipeline needs to survive a restart:
//!   accepted readings (hence the last accepted timestamp per site), the
//!   current alert state per site, and the log of tier changes.
//! - [`ReadingHistory`]: read-only access to accepted readings for offline
//!   analysis. Nothing reachable through it can touch window or alert state.
//! - [`AlertLog`]: operator access to the tier-change log (listing and
//!   acknowledging) and the service-wide summary.
//!
//! `MemoryStore` backs tests and database-less runs; `db::PgStore` backs
//! production.

pub mod memory;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::model::{AlertEvent, AlertState, FloodError, LoggedAlert, Reading};

pub use memory::MemoryStore;

/// Persisted state of one site, as loaded at startup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistedSite {
    pub last_accepted: Option<DateTime<Utc>>,
    pub alert: Option<AlertState>,
}

pub trait StateStore: Send {
    fn load_site(&mut self, site_id: &str) -> Result<PersistedSite, FloodError>;

    fn record_reading(&mut self, reading: &Reading) -> Result<(), FloodError>;

    fn save_alert(&mut self, state: &AlertState) -> Result<(), FloodError>;

    /// Appends a tier change to the alert log and returns its id.
    fn record_alert_event(&mut self, event: &AlertEvent) -> Result<i64, FloodError>;

    /// Up to `limit` most recent readings for a site, oldest first.
    fn recent_readings(&mut self, site_id: &str, limit: usize) -> Result<Vec<Reading>, FloodError>;

    /// Cheap reachability check used by the startup preflight.
    fn ping(&mut self) -> Result<(), FloodError> {
        Ok(())
    }
}

pub trait ReadingHistory {
    /// Accepted readings for a site, oldest first, optionally from `since` on.
    fn history(
        &mut self,
        site_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Reading>, FloodError>;
}

/// Look-back of the reading counts in [`SystemSummary`].
pub const SUMMARY_WINDOW_HOURS: i64 = 24;

/// Service-wide counts for operators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemSummary {
    pub generated_at: DateTime<Utc>,
    /// Sites with at least one accepted reading in the summary window.
    pub reporting_sites: usize,
    pub readings_24h: usize,
    pub unacknowledged_alerts: usize,
    /// Sites whose live alert state is RED.
    pub red_sites: usize,
}

/// Start of the summary window ending at `now`.
pub fn summary_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::hours(SUMMARY_WINDOW_HOURS)
}

pub trait AlertLog {
    /// Unacknowledged entries, newest first.
    fn active_alerts(&mut self) -> Result<Vec<LoggedAlert>, FloodError>;

    /// Marks entry `id` acknowledged by `by` at `at`. Returns `false` when
    /// there is no such entry or it was already acknowledged.
    fn acknowledge_alert(
        &mut self,
        id: i64,
        by: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, FloodError>;

    fn system_summary(&mut self, now: DateTime<Utc>) -> Result<SystemSummary, FloodError>;
}
