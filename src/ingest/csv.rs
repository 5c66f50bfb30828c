/// CSV decoding of historical readings.
///
/// Expected columns, header row first:
///
/// ```text
/// site_id,timestamp,water_level,rainfall,soil_moisture
/// SP001,2025-01-15T10:30:00,82.7,25.3,95.2
/// ```
///
/// Blank lines and `#` comments are skipped. A malformed row is reported
/// with its 1-based line number and does not stop the rest of the file
/// from decoding.

use std::fs;
use std::path::Path;

use crate::model::{FloodError, RawReading};

pub const HEADER: &str = "site_id,timestamp,water_level,rainfall,soil_moisture";

/// A row that could not be decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct CsvBatch {
    pub readings: Vec<RawReading>,
    pub errors: Vec<RowError>,
}

pub fn read_file(path: &Path) -> Result<CsvBatch, FloodError> {
    let text = fs::read_to_string(path)
        .map_err(|e| FloodError::Transport(format!("cannot read {}: {}", path.display(), e)))?;
    Ok(parse(&text))
}

pub fn parse(text: &str) -> CsvBatch {
    let mut batch = CsvBatch::default();
    let mut header_seen = false;

    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if !header_seen {
            header_seen = true;
            if line.to_ascii_lowercase().starts_with("site_id") {
                continue;
            }
        }
        match parse_row(line) {
            Ok(raw) => batch.readings.push(raw),
            Err(message) => batch.errors.push(RowError { line: idx + 1, message }),
        }
    }

    batch
}

fn parse_row(line: &str) -> Result<RawReading, String> {
    let cols: Vec<&str> = line.split(',').map(str::trim).collect();
    if cols.len() != 5 {
        return Err(format!("expected 5 columns, found {}", cols.len()));
    }
    let number = |name: &str, text: &str| -> Result<f64, String> {
        text.parse::<f64>()
            .map_err(|_| format!("{} '{}' is not a number", name, text))
    };
    Ok(RawReading {
        site_id: cols[0].to_string(),
        timestamp: cols[1].to_string(),
        water_level_cm: number("water_level", cols[2])?,
        rainfall_mm: number("rainfall", cols[3])?,
        soil_moisture_pct: number("soil_moisture", cols[4])?,
    })
}
