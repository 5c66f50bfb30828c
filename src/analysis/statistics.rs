/// Per-site summary statistics.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::model::{FloodError, Reading};
use crate::store::ReadingHistory;

/// Summary of one feature over a period. `std` is the sample standard
/// deviation and is absent with fewer than two readings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub std: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteStatistics {
    pub site_id: String,
    pub period_days: i64,
    pub total_readings: usize,
    pub first_reading: DateTime<Utc>,
    pub last_reading: DateTime<Utc>,
    pub water_level_cm: FeatureStats,
    pub rainfall_mm: FeatureStats,
    pub soil_moisture_pct: FeatureStats,
}

/// Statistics for readings of `site_id` in the `days` before `now`.
///
/// Returns `Ok(None)` when the site has no readings in that period.
pub fn site_statistics(
    history: &mut dyn ReadingHistory,
    site_id: &str,
    days: i64,
    now: DateTime<Utc>,
) -> Result<Option<SiteStatistics>, FloodError> {
    let since = now - Duration::days(days);
    let readings: Vec<Reading> = history
        .history(site_id, Some(since))?
        .into_iter()
        .filter(|r| r.timestamp <= now)
        .collect();

    let (Some(first), Some(last)) = (readings.first(), readings.last()) else {
        return Ok(None);
    };

    let column = |f: fn(&Reading) -> f64| -> Vec<f64> { readings.iter().map(f).collect() };

    Ok(Some(SiteStatistics {
        site_id: site_id.to_string(),
        period_days: days,
        total_readings: readings.len(),
        first_reading: first.timestamp,
        last_reading: last.timestamp,
        water_level_cm: summarize(&column(|r| r.water_level_cm)),
        rainfall_mm: summarize(&column(|r| r.rainfall_mm)),
        soil_moisture_pct: summarize(&column(|r| r.soil_moisture_pct)),
    }))
}

/// Caller guarantees `values` is non-empty.
fn summarize(values: &[f64]) -> FeatureStats {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let std = (values.len() > 1).then(|| {
        let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
        (ss / (n - 1.0)).sqrt()
    });
    FeatureStats { mean, min, max, std }
}
