/// PostgreSQL persistence for pipeline state.
///
/// Connection details come from `DATABASE_URL` (a `.env` file is honoured).
/// The schema lives in `sql/001_floodwatch_schema.sql` and
/// `sql/002_alert_events.sql`.

use chrono::{DateTime, Utc};
use postgres::{Client, NoTls, Row};
use std::env;

use crate::model::{AlertEvent, AlertState, FloodError, LoggedAlert, Reading, Tier};
use crate::store::{
    AlertLog, PersistedSite, ReadingHistory, StateStore, SystemSummary, summary_cutoff,
};

pub const SCHEMA: &str = "floodwatch";

fn storage_err(context: &str, e: postgres::Error) -> FloodError {
    FloodError::Storage(format!("{}: {}", context, e))
}

/// Connects using `DATABASE_URL` and checks that each named schema exists.
pub fn connect_and_verify(schemas: &[&str]) -> Result<Client, FloodError> {
    dotenv::dotenv().ok();
    let url = env::var("DATABASE_URL").map_err(|_| {
        FloodError::Configuration("DATABASE_URL must be set in .env or environment".to_string())
    })?;
    let mut client = Client::connect(&url, NoTls).map_err(|e| storage_err("connect", e))?;

    for schema in schemas {
        let row = client
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM information_schema.schemata WHERE schema_name = $1)",
                &[schema],
            )
            .map_err(|e| storage_err("schema check", e))?;
        let exists: bool = row.get(0);
        if !exists {
            return Err(FloodError::Configuration(format!(
                "schema '{}' is missing; apply sql/001_floodwatch_schema.sql",
                schema
            )));
        }
    }
    Ok(client)
}

fn tier_to_str(tier: Tier) -> &'static str {
    match tier {
        Tier::Green => "GREEN",
        Tier::Yellow => "YELLOW",
        Tier::Red => "RED",
    }
}

fn tier_from_str(text: &str) -> Result<Tier, FloodError> {
    match text {
        "GREEN" => Ok(Tier::Green),
        "YELLOW" => Ok(Tier::Yellow),
        "RED" => Ok(Tier::Red),
        other => Err(FloodError::Storage(format!("unknown tier '{}' in database", other))),
    }
}

fn reading_from_row(row: &Row) -> Reading {
    Reading {
        site_id: row.get(0),
        timestamp: row.get(1),
        water_level_cm: row.get(2),
        rainfall_mm: row.get(3),
        soil_moisture_pct: row.get(4),
    }
}

fn logged_alert_from_row(row: &Row) -> Result<LoggedAlert, FloodError> {
    let previous: Option<String> = row.get(2);
    let tier: String = row.get(3);
    Ok(LoggedAlert {
        id: row.get(0),
        event: AlertEvent {
            site_id: row.get(1),
            previous_tier: previous.as_deref().map(tier_from_str).transpose()?,
            tier: tier_from_str(&tier)?,
            probability: row.get(4),
            raised_at: row.get(5),
        },
        acknowledged_by: row.get(6),
        acknowledged_at: row.get(7),
    })
}

pub struct PgStore {
    client: Client,
}

impl PgStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connects via `DATABASE_URL` and verifies the schema.
    pub fn from_env() -> Result<Self, FloodError> {
        Ok(Self::new(connect_and_verify(&[SCHEMA])?))
    }
}

impl StateStore for PgStore {
    fn load_site(&mut self, site_id: &str) -> Result<PersistedSite, FloodError> {
        let row = self
            .client
            .query_one(
                "SELECT MAX(measured_at) FROM floodwatch.readings WHERE site_id = $1",
                &[&site_id],
            )
            .map_err(|e| storage_err("load last reading", e))?;
        let last_accepted: Option<DateTime<Utc>> = row.get(0);

        let alert = match self
            .client
            .query_opt(
                "SELECT tier, since, last_probability, below_threshold_count, pending_tier, updated_at
                 FROM floodwatch.alert_states
                 WHERE site_id = $1",
                &[&site_id],
            )
            .map_err(|e| storage_err("load alert state", e))?
        {
            Some(row) => {
                let tier: String = row.get(0);
                let count: i32 = row.get(3);
                let pending: Option<String> = row.get(4);
                Some(AlertState {
                    site_id: site_id.to_string(),
                    tier: tier_from_str(&tier)?,
                    since: row.get(1),
                    last_probability: row.get(2),
                    below_threshold_count: count.max(0) as u32,
                    pending_tier: pending.as_deref().map(tier_from_str).transpose()?,
                    updated_at: row.get(5),
                })
            }
            None => None,
        };

        Ok(PersistedSite { last_accepted, alert })
    }

    fn record_reading(&mut self, reading: &Reading) -> Result<(), FloodError> {
        self.client
            .execute(
                "INSERT INTO floodwatch.readings
                 (site_id, measured_at, water_level_cm, rainfall_mm, soil_moisture_pct)
                 VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT (site_id, measured_at) DO NOTHING",
                &[
                    &reading.site_id,
                    &reading.timestamp,
                    &reading.water_level_cm,
                    &reading.rainfall_mm,
                    &reading.soil_moisture_pct,
                ],
            )
            .map(|_| ())
            .map_err(|e| storage_err("insert reading", e))
    }

    fn save_alert(&mut self, state: &AlertState) -> Result<(), FloodError> {
        let count = state.below_threshold_count as i32;
        let pending = state.pending_tier.map(tier_to_str);
        self.client
            .execute(
                "INSERT INTO floodwatch.alert_states
                 (site_id, tier, since, last_probability, below_threshold_count, pending_tier, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)
                 ON CONFLICT (site_id) DO UPDATE SET
                     tier = EXCLUDED.tier,
                     since = EXCLUDED.since,
                     last_probability = EXCLUDED.last_probability,
                     below_threshold_count = EXCLUDED.below_threshold_count,
                     pending_tier = EXCLUDED.pending_tier,
                     updated_at = EXCLUDED.updated_at",
                &[
                    &state.site_id,
                    &tier_to_str(state.tier),
                    &state.since,
                    &state.last_probability,
                    &count,
                    &pending,
                    &state.updated_at,
                ],
            )
            .map(|_| ())
            .map_err(|e| storage_err("upsert alert state", e))
    }

    fn recent_readings(&mut self, site_id: &str, limit: usize) -> Result<Vec<Reading>, FloodError> {
        let limit = limit as i64;
        let rows = self
            .client
            .query(
                "SELECT site_id, measured_at, water_level_cm, rainfall_mm, soil_moisture_pct
                 FROM floodwatch.readings
                 WHERE site_id = $1
                 ORDER BY measured_at DESC
                 LIMIT $2",
                &[&site_id, &limit],
            )
            .map_err(|e| storage_err("load recent readings", e))?;
        let mut readings: Vec<Reading> = rows.iter().map(reading_from_row).collect();
        readings.reverse();
        Ok(readings)
    }

    fn record_alert_event(&mut self, event: &AlertEvent) -> Result<i64, FloodError> {
        let previous = event.previous_tier.map(tier_to_str);
        let row = self
            .client
            .query_one(
                "INSERT INTO floodwatch.alert_events
                 (site_id, previous_tier, tier, probability, raised_at)
                 VALUES ($1, $2, $3, $4, $5)
                 RETURNING id",
                &[
                    &event.site_id,
                    &previous,
                    &tier_to_str(event.tier),
                    &event.probability,
                    &event.raised_at,
                ],
            )
            .map_err(|e| storage_err("insert alert event", e))?;
        Ok(row.get(0))
    }

    fn ping(&mut self) -> Result<(), FloodError> {
        self.client
            .simple_query("SELECT 1")
            .map(|_| ())
            .map_err(|e| storage_err("ping", e))
    }
}

impl ReadingHistory for PgStore {
    fn history(
        &mut self,
        site_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Reading>, FloodError> {
        let rows = self
            .client
            .query(
                "SELECT site_id, measured_at, water_level_cm, rainfall_mm, soil_moisture_pct
                 FROM floodwatch.readings
                 WHERE site_id = $1
                   AND ($2::timestamptz IS NULL OR measured_at >= $2)
                 ORDER BY measured_at ASC",
                &[&site_id, &since],
            )
            .map_err(|e| storage_err("load history", e))?;
        Ok(rows.iter().map(reading_from_row).collect())
    }
}

impl AlertLog for PgStore {
    fn active_alerts(&mut self) -> Result<Vec<LoggedAlert>, FloodError> {
        let rows = self
            .client
            .query(
                "SELECT id, site_id, previous_tier, tier, probability, raised_at,
                        acknowledged_by, acknowledged_at
                 FROM floodwatch.alert_events
                 WHERE NOT acknowledged
                 ORDER BY raised_at DESC, id DESC",
                &[],
            )
            .map_err(|e| storage_err("load active alerts", e))?;
        rows.iter().map(logged_alert_from_row).collect()
    }

    fn acknowledge_alert(
        &mut self,
        id: i64,
        by: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, FloodError> {
        let updated = self
            .client
            .execute(
                "UPDATE floodwatch.alert_events
                 SET acknowledged = TRUE, acknowledged_by = $2, acknowledged_at = $3
                 WHERE id = $1 AND NOT acknowledged",
                &[&id, &by, &at],
            )
            .map_err(|e| storage_err("acknowledge alert", e))?;
        Ok(updated == 1)
    }

    fn system_summary(&mut self, now: DateTime<Utc>) -> Result<SystemSummary, FloodError> {
        let cutoff = summary_cutoff(now);
        let row = self
            .client
            .query_one(
                "SELECT
                     (SELECT COUNT(DISTINCT site_id) FROM floodwatch.readings WHERE measured_at >= $1),
                     (SELECT COUNT(*) FROM floodwatch.readings WHERE measured_at >= $1),
                     (SELECT COUNT(*) FROM floodwatch.alert_events WHERE NOT acknowledged),
                     (SELECT COUNT(*) FROM floodwatch.alert_states WHERE tier = 'RED')",
                &[&cutoff],
            )
            .map_err(|e| storage_err("system summary", e))?;
        let count = |i: usize| row.get::<_, i64>(i).max(0) as usize;
        Ok(SystemSummary {
            generated_at: now,
            reporting_sites: count(0),
            readings_24h: count(1),
            unacknowledged_alerts: count(2),
            red_sites: count(3),
        })
    }
}
