/// Offline analysis over accepted-reading history.
///
/// Everything here reads through `ReadingHistory` only. Nothing in this
/// module can reach a window or an alert state, so retrospective work never
/// disturbs the live pipeline.
///
/// Submodules:
/// - `statistics` computes per-site summary statistics over a period.
/// - `export` writes a site's history as CSV the replay path can read back.

pub mod export;
pub mod statistics;

pub use export::{export_csv, export_to_file};
pub use statistics::{FeatureStats, SiteStatistics, site_statistics};
