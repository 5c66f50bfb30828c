/// CSV export of a site's accepted-reading history.
///
/// Output uses the ingestion CSV layout, so an export can be fed straight
/// back into `floodwatch replay`.

use chrono::{DateTime, SecondsFormat, Utc};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::ingest::csv::HEADER;
use crate::model::FloodError;
use crate::store::ReadingHistory;

/// Writes readings of `site_id` (from `since` on, if given) to `out`.
/// Returns the number of rows written.
pub fn export_csv<W: Write>(
    history: &mut dyn ReadingHistory,
    site_id: &str,
    since: Option<DateTime<Utc>>,
    out: &mut W,
) -> Result<usize, FloodError> {
    let readings = history.history(site_id, since)?;
    let io_err = |e: std::io::Error| FloodError::Storage(format!("export write failed: {}", e));

    writeln!(out, "{}", HEADER).map_err(io_err)?;
    for r in &readings {
        writeln!(
            out,
            "{},{},{},{},{}",
            r.site_id,
            r.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            r.water_level_cm,
            r.rainfall_mm,
            r.soil_moisture_pct
        )
        .map_err(io_err)?;
    }
    out.flush().map_err(io_err)?;
    Ok(readings.len())
}

pub fn export_to_file(
    history: &mut dyn ReadingHistory,
    site_id: &str,
    since: Option<DateTime<Utc>>,
    path: &Path,
) -> Result<usize, FloodError> {
    let file = File::create(path)
        .map_err(|e| FloodError::Storage(format!("cannot create {}: {}", path.display(), e)))?;
    let mut writer = BufWriter::new(file);
    export_csv(history, site_id, since, &mut writer)
}
