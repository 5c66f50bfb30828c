//! In-process store.
//!
//! Clones share the same underlying maps, so several workers (and an
//! analysis reader) can hold handles to one store.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{AlertLog, PersistedSite, ReadingHistory, StateStore, SystemSummary, summary_cutoff};
use crate::model::{AlertEvent, AlertState, FloodError, LoggedAlert, Reading, Tier};

#[derive(Debug, Default)]
struct Inner {
    readings: HashMap<String, Vec<Reading>>,
    alerts: HashMap<String, AlertState>,
    events: Vec<LoggedAlert>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, FloodError> {
        self.inner
            .lock()
            .map_err(|_| FloodError::Storage("memory store lock poisoned".to_string()))
    }

    /// Number of readings stored for a site.
    pub fn reading_count(&self, site_id: &str) -> usize {
        self.lock()
            .map(|inner| inner.readings.get(site_id).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    pub fn alert(&self, site_id: &str) -> Option<AlertState> {
        self.lock().ok().and_then(|inner| inner.alerts.get(site_id).cloned())
    }

    /// Every alert log entry for a site, oldest first.
    pub fn alert_events(&self, site_id: &str) -> Vec<LoggedAlert> {
        self.lock()
            .map(|inner| {
                inner
                    .events
                    .iter()
                    .filter(|e| e.event.site_id == site_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl StateStore for MemoryStore {
    fn load_site(&mut self, site_id: &str) -> Result<PersistedSite, FloodError> {
        let inner = self.lock()?;
        Ok(PersistedSite {
            last_accepted: inner
                .readings
                .get(site_id)
                .and_then(|rs| rs.last())
                .map(|r| r.timestamp),
            alert: inner.alerts.get(site_id).cloned(),
        })
    }

    fn record_reading(&mut self, reading: &Reading) -> Result<(), FloodError> {
        let mut inner = self.lock()?;
        let readings = inner.readings.entry(reading.site_id.clone()).or_default();
        if readings.last().is_some_and(|last| last.timestamp >= reading.timestamp) {
            return Err(FloodError::Storage(format!(
                "reading for {} at {} is not newer than stored history",
                reading.site_id,
                reading.timestamp.to_rfc3339()
            )));
        }
        readings.push(reading.clone());
        Ok(())
    }

    fn save_alert(&mut self, state: &AlertState) -> Result<(), FloodError> {
        self.lock()?.alerts.insert(state.site_id.clone(), state.clone());
        Ok(())
    }

    fn recent_readings(&mut self, site_id: &str, limit: usize) -> Result<Vec<Reading>, FloodError> {
        let inner = self.lock()?;
        let readings = inner.readings.get(site_id).map(Vec::as_slice).unwrap_or(&[]);
        let start = readings.len().saturating_sub(limit);
        Ok(readings[start..].to_vec())
    }

    fn record_alert_event(&mut self, event: &AlertEvent) -> Result<i64, FloodError> {
        let mut inner = self.lock()?;
        let id = inner.events.len() as i64 + 1;
        inner.events.push(LoggedAlert {
            id,
            event: event.clone(),
            acknowledged_by: None,
            acknowledged_at: None,
        });
        Ok(id)
    }
}

impl AlertLog for MemoryStore {
    fn active_alerts(&mut self) -> Result<Vec<LoggedAlert>, FloodError> {
        let inner = self.lock()?;
        let mut active: Vec<LoggedAlert> = inner
            .events
            .iter()
            .filter(|e| !e.is_acknowledged())
            .cloned()
            .collect();
        active.sort_by(|a, b| b.event.raised_at.cmp(&a.event.raised_at).then(b.id.cmp(&a.id)));
        Ok(active)
    }

    fn acknowledge_alert(
        &mut self,
        id: i64,
        by: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, FloodError> {
        let mut inner = self.lock()?;
        match inner.events.iter_mut().find(|e| e.id == id) {
            Some(entry) if !entry.is_acknowledged() => {
                entry.acknowledged_by = Some(by.to_string());
                entry.acknowledged_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn system_summary(&mut self, now: DateTime<Utc>) -> Result<SystemSummary, FloodError> {
        let inner = self.lock()?;
        let cutoff = summary_cutoff(now);
        let recent_per_site: Vec<usize> = inner
            .readings
            .values()
            .map(|rs| rs.iter().filter(|r| r.timestamp >= cutoff).count())
            .collect();
        Ok(SystemSummary {
            generated_at: now,
            reporting_sites: recent_per_site.iter().filter(|&&n| n > 0).count(),
            readings_24h: recent_per_site.iter().sum(),
            unacknowledged_alerts: inner.events.iter().filter(|e| !e.is_acknowledged()).count(),
            red_sites: inner.alerts.values().filter(|a| a.tier == Tier::Red).count(),
        })
    }
}

impl ReadingHistory for MemoryStore {
    fn history(
        &mut self,
        site_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Reading>, FloodError> {
        let inner = self.lock()?;
        Ok(inner
            .readings
            .get(site_id)
            .map(|rs| {
                rs.iter()
                    .filter(|r| since.is_none_or(|s| r.timestamp >= s))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
