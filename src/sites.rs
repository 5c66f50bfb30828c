/// Site registry for the flood early-warning service.
///
/// Defines the monitored field sites and the rules for what a site id may
/// look like. The registry is the single source of truth for which sites
/// the validator accepts; everything else asks it rather than hardcoding ids.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::model::FloodError;

/// Longest site id the service accepts.
pub const MAX_SITE_ID_LEN: usize = 32;

// ---------------------------------------------------------------------------
// Site metadata
// ---------------------------------------------------------------------------

/// Metadata for one monitored site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub id: String,
    pub name: String,
    /// WGS84 latitude.
    pub latitude: f64,
    /// WGS84 longitude.
    pub longitude: f64,
}

/// Sites registered when the configuration does not list any.
pub fn default_sites() -> Vec<Site> {
    [
        ("SP001", "São Paulo - Zona Norte", -23.50, -46.63),
        ("RJ001", "Rio de Janeiro - Maracanã", -22.91, -43.23),
        ("BL001", "Blumenau - Centro", -26.91, -49.06),
        ("PE001", "Recife - Boa Viagem", -8.12, -34.90),
        ("RS001", "Porto Alegre - Sarandi", -30.03, -51.18),
    ]
    .into_iter()
    .map(|(id, name, latitude, longitude)| Site {
        id: id.to_string(),
        name: name.to_string(),
        latitude,
        longitude,
    })
    .collect()
}

/// Returns `true` if `id` is 1..=32 ASCII letters, digits, `_` or `-`.
pub fn is_valid_site_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_SITE_ID_LEN
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Lookup table of registered sites, preserving configuration order.
#[derive(Debug, Clone)]
pub struct SiteRegistry {
    sites: Vec<Site>,
    index: HashMap<String, usize>,
}

impl SiteRegistry {
    /// Builds a registry, rejecting malformed or duplicate ids.
    pub fn new(sites: Vec<Site>) -> Result<Self, FloodError> {
        let mut index = HashMap::with_capacity(sites.len());
        for (i, site) in sites.iter().enumerate() {
            if !is_valid_site_id(&site.id) {
                return Err(FloodError::Configuration(format!(
                    "site id '{}' is malformed",
                    site.id
                )));
            }
            if index.insert(site.id.clone(), i).is_some() {
                return Err(FloodError::Configuration(format!(
                    "site id '{}' is registered twice",
                    site.id
                )));
            }
        }
        Ok(Self { sites, index })
    }

    /// Looks up a site by id. Returns `None` if not registered.
    pub fn find_site(&self, id: &str) -> Option<&Site> {
        self.index.get(id).map(|&i| &self.sites[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn all_site_ids(&self) -> Vec<&str> {
        self.sites.iter().map(|s| s.id.as_str()).collect()
    }

    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
