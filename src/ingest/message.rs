/// JSON decoding of single field-unit messages.
///
/// Field units send one reading per message:
///
/// ```json
/// {"device_id": "SP001", "water_level": 82.7, "rainfall": 25.3,
///  "soil_moisture": 95.2, "timestamp": "2025-01-15T10:30:00"}
/// ```
///
/// Canonical field names (`site_id`, `water_level_cm`, ...) are accepted too.

use crate::model::{FloodError, RawReading};

pub fn decode_reading(payload: &str) -> Result<RawReading, FloodError> {
    serde_json::from_str(payload)
        .map_err(|e| FloodError::Transport(format!("undecodable reading message: {}", e)))
}

/// Decodes a JSON array of readings, as returned by the gateway.
pub fn decode_batch(payload: &str) -> Result<Vec<RawReading>, FloodError> {
    serde_json::from_str(payload)
        .map_err(|e| FloodError::Transport(format!("undecodable reading batch: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_message_uses_field_aliases() {
        let raw = decode_reading(
            r#"{"device_id": "SP001", "water_level": 82.7, "rainfall": 25.3,
                "soil_moisture": 95.2, "timestamp": "2025-01-15T10:30:00"}"#,
        )
        .unwrap();
        assert_eq!(raw.site_id, "SP001");
        assert_eq!(raw.water_level_cm, 82.7);
        assert_eq!(raw.rainfall_mm, 25.3);
        assert_eq!(raw.soil_moisture_pct, 95.2);
        assert_eq!(raw.timestamp, "2025-01-15T10:30:00");
    }

    #[test]
    fn test_canonical_field_names_decode() {
        let raw = decode_reading(
            r#"{"site_id": "RJ001", "water_level_cm": 10.0, "rainfall_mm": 0.0,
                "soil_moisture_pct": 40.0, "timestamp": "2025-01-15T10:30:00Z"}"#,
        )
        .unwrap();
        assert_eq!(raw.site_id, "RJ001");
    }

    #[test]
    fn test_bad_timestamp_still_decodes_for_the_validator_to_reject() {
        let raw = decode_reading(
            r#"{"site_id": "RJ001", "water_level": 1, "rainfall": 1,
                "soil_moisture": 1, "timestamp": "yesterday"}"#,
        )
        .unwrap();
        assert_eq!(raw.timestamp, "yesterday");
    }

    #[test]
    fn test_missing_field_is_a_transport_error() {
        let result = decode_reading(r#"{"site_id": "SP001", "timestamp": "2025-01-15T10:30:00"}"#);
        assert!(matches!(result, Err(FloodError::Transport(_))));
    }

    #[test]
    fn test_batch_decodes_in_order() {
        let batch = decode_batch(
            r#"[{"site_id": "SP001", "water_level": 1, "rainfall": 0, "soil_moisture": 50, "timestamp": "2025-01-01T00:00:00Z"},
                {"site_id": "SP001", "water_level": 2, "rainfall": 0, "soil_moisture": 50, "timestamp": "2025-01-02T00:00:00Z"}]"#,
        )
        .unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[1].water_level_cm, 2.0);
    }
}
