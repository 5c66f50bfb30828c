/// Reading validation.
///
/// Turns a `RawReading` into an accepted `Reading` or a rejection. The
/// validator holds no per-site state: the caller passes in the last accepted
/// timestamp for the site, so the same checks serve the live pipeline and
/// offline replays alike.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::sync::Arc;

use crate::config::LimitsConfig;
use crate::model::{FloodError, RawReading, Reading, Rejection};
use crate::sites::{self, SiteRegistry};

/// Naive formats field units are known to send; interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parses an RFC 3339 timestamp, or a naive ISO-8601 one taken as UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[derive(Debug, Clone)]
pub struct Validator {
    registry: Arc<SiteRegistry>,
    limits: LimitsConfig,
}

impl Validator {
    pub fn new(registry: Arc<SiteRegistry>, limits: LimitsConfig) -> Self {
        Self { registry, limits }
    }

    /// Validates one raw reading.
    ///
    /// `last_accepted` is the newest timestamp already accepted for the
    /// site; the new reading must be strictly later.
    pub fn validate(
        &self,
        raw: &RawReading,
        last_accepted: Option<DateTime<Utc>>,
    ) -> Result<Reading, FloodError> {
        let site_id = raw.site_id.trim();
        if !sites::is_valid_site_id(site_id) {
            return Err(Rejection::MalformedSiteId(raw.site_id.clone()).into());
        }
        if !self.registry.contains(site_id) {
            return Err(Rejection::UnknownSite(site_id.to_string()).into());
        }

        let timestamp = parse_timestamp(&raw.timestamp)
            .ok_or_else(|| Rejection::BadTimestamp(raw.timestamp.clone()))?;

        let l = &self.limits;
        check_range("water_level_cm", raw.water_level_cm, 0.0, l.water_level_cm_max)?;
        check_range("rainfall_mm", raw.rainfall_mm, 0.0, l.rainfall_mm_max)?;
        check_range(
            "soil_moisture_pct",
            raw.soil_moisture_pct,
            l.soil_moisture_pct_min,
            l.soil_moisture_pct_max,
        )?;

        if let Some(last) = last_accepted {
            if timestamp <= last {
                return Err(FloodError::Ordering {
                    site_id: site_id.to_string(),
                    last_accepted: last,
                    received: timestamp,
                });
            }
        }

        Ok(Reading {
            site_id: site_id.to_string(),
            timestamp,
            water_level_cm: raw.water_level_cm,
            rainfall_mm: raw.rainfall_mm,
            soil_moisture_pct: raw.soil_moisture_pct,
        })
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), Rejection> {
    if !value.is_finite() {
        return Err(Rejection::NonFinite { field });
    }
    if value < min || value > max {
        return Err(Rejection::OutOfRange { field, value, min, max });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sites::default_sites;
    use chrono::TimeZone;

    fn validator() -> Validator {
        let registry = Arc::new(SiteRegistry::new(default_sites()).unwrap());
        Validator::new(registry, LimitsConfig::default())
    }

    fn raw(site: &str, ts: &str, water: f64, rain: f64, soil: f64) -> RawReading {
        RawReading {
            site_id: site.to_string(),
            timestamp: ts.to_string(),
            water_level_cm: water,
            rainfall_mm: rain,
            soil_moisture_pct: soil,
        }
    }

    // --- Accepted -----------------------------------------------------------

    #[test]
    fn test_valid_reading_is_accepted_with_parsed_timestamp() {
        let reading = validator()
            .validate(&raw("SP001", "2025-06-01T12:00:00Z", 82.7, 25.3, 95.2), None)
            .expect("in-range reading should be accepted");
        assert_eq!(reading.site_id, "SP001");
        assert_eq!(reading.timestamp, Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_boundary_values_are_inclusive() {
        let v = validator();
        assert!(v.validate(&raw("SP001", "2025-06-01T00:00:00Z", 0.0, 0.0, 0.0), None).is_ok());
        assert!(v.validate(&raw("SP001", "2025-06-01T00:00:00Z", 1000.0, 200.0, 100.0), None).is_ok());
    }

    #[test]
    fn test_naive_iso_timestamp_is_treated_as_utc() {
        let reading = validator()
            .validate(&raw("RJ001", "2025-06-01T09:30:00.123456", 50.0, 1.0, 40.0), None)
            .unwrap();
        assert_eq!(reading.timestamp.timestamp(), Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap().timestamp());
    }

    #[test]
    fn test_offset_timestamp_is_normalised_to_utc() {
        let reading = validator()
            .validate(&raw("SP001", "2025-06-01T09:00:00-03:00", 50.0, 1.0, 40.0), None)
            .unwrap();
        assert_eq!(reading.timestamp, Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap());
    }

    // --- Rejected: ranges ---------------------------------------------------

    #[test]
    fn test_out_of_range_fields_are_rejected() {
        let v = validator();
        let cases = [
            (raw("SP001", "2025-06-01T00:00:00Z", -0.1, 1.0, 50.0), "water_level_cm"),
            (raw("SP001", "2025-06-01T00:00:00Z", 1000.1, 1.0, 50.0), "water_level_cm"),
            (raw("SP001", "2025-06-01T00:00:00Z", 50.0, -1.0, 50.0), "rainfall_mm"),
            (raw("SP001", "2025-06-01T00:00:00Z", 50.0, 250.0, 50.0), "rainfall_mm"),
            (raw("SP001", "2025-06-01T00:00:00Z", 50.0, 1.0, -5.0), "soil_moisture_pct"),
            (raw("SP001", "2025-06-01T00:00:00Z", 50.0, 1.0, 100.5), "soil_moisture_pct"),
        ];
        for (reading, expected_field) in cases {
            match v.validate(&reading, None) {
                Err(FloodError::Validation(Rejection::OutOfRange { field, .. })) => {
                    assert_eq!(field, expected_field)
                }
                other => panic!("expected {} out of range, got {:?}", expected_field, other),
            }
        }
    }

    #[test]
    fn test_nan_field_is_rejected_as_non_finite() {
        let result = validator().validate(&raw("SP001", "2025-06-01T00:00:00Z", f64::NAN, 1.0, 50.0), None);
        assert_eq!(
            result,
            Err(FloodError::Validation(Rejection::NonFinite { field: "water_level_cm" }))
        );
    }

    // --- Rejected: identity and time ----------------------------------------

    #[test]
    fn test_unknown_and_malformed_sites_are_rejected() {
        let v = validator();
        let unknown = v.validate(&raw("XX999", "2025-06-01T00:00:00Z", 1.0, 1.0, 1.0), None);
        assert!(matches!(unknown, Err(FloodError::Validation(Rejection::UnknownSite(_)))));

        let malformed = v.validate(&raw("SP 001", "2025-06-01T00:00:00Z", 1.0, 1.0, 1.0), None);
        assert!(matches!(malformed, Err(FloodError::Validation(Rejection::MalformedSiteId(_)))));
    }

    #[test]
    fn test_unparseable_timestamp_is_rejected() {
        let result = validator().validate(&raw("SP001", "yesterday", 1.0, 1.0, 1.0), None);
        assert!(matches!(result, Err(FloodError::Validation(Rejection::BadTimestamp(_)))));
    }

    #[test]
    fn test_duplicate_and_older_timestamps_are_ordering_errors() {
        let v = validator();
        let last = Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap();

        let duplicate = v.validate(&raw("SP001", "2025-06-02T00:00:00Z", 1.0, 1.0, 1.0), Some(last));
        assert!(matches!(duplicate, Err(FloodError::Ordering { .. })), "equal timestamp must be rejected");

        let older = v.validate(&raw("SP001", "2025-06-01T00:00:00Z", 1.0, 1.0, 1.0), Some(last));
        assert!(matches!(older, Err(FloodError::Ordering { .. })));

        let newer = v.validate(&raw("SP001", "2025-06-02T00:00:01Z", 1.0, 1.0, 1.0), Some(last));
        assert!(newer.is_ok(), "strictly later timestamp must be accepted");
    }
}
