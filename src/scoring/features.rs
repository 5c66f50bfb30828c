//! Feature representation of a scoring window.

use crate::model::Reading;
use crate::window::Window;

/// Column order of every feature row. The bundled model was trained on
/// this order; artifacts must follow it.
pub const FEATURE_NAMES: [&str; 3] = ["rainfall_mm", "soil_moisture_pct", "water_level_cm"];

pub const RAINFALL: usize = 0;
pub const SOIL_MOISTURE: usize = 1;
pub const WATER_LEVEL: usize = 2;

/// W rows of `[rainfall_mm, soil_moisture_pct, water_level_cm]`, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSequence {
    rows: Vec<[f64; 3]>,
}

impl FeatureSequence {
    pub fn from_readings(readings: &[Reading]) -> Self {
        let rows = readings
            .iter()
            .map(|r| [r.rainfall_mm, r.soil_moisture_pct, r.water_level_cm])
            .collect();
        Self { rows }
    }

    pub fn from_window(window: &Window) -> Self {
        Self::from_readings(window.readings())
    }

    pub fn from_rows(rows: Vec<[f64; 3]>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[[f64; 3]] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Most recent row.
    pub fn latest(&self) -> Option<&[f64; 3]> {
        self.rows.last()
    }
}
