//! Settlement catalog: named places with population estimates.
//!
//! Backs two features: population estimation for grid candidates (nearest
//! settlement match) and settlement-anchored candidate mixing in the grid
//! builder. Same embedded-default-plus-file-override scheme as the region
//! catalog.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::regions::BoundingBox;

const BUILTIN_SETTLEMENTS: &str = include_str!("../../../config/settlements.yaml");

/// A named place with coordinates and a population estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub population: u32,
}

#[derive(Debug, Deserialize)]
struct SettlementsFile {
    settlements: Vec<Settlement>,
}

/// The loaded settlement catalog.
#[derive(Debug, Clone)]
pub struct SettlementCatalog {
    entries: Vec<Settlement>,
}

impl SettlementCatalog {
    /// Loads the catalog embedded at build time.
    ///
    /// # Panics
    ///
    /// Panics if the embedded YAML is malformed — a build defect.
    #[must_use]
    pub fn builtin() -> Self {
        Self::from_yaml(BUILTIN_SETTLEMENTS).expect("embedded settlements.yaml must be valid")
    }

    /// Loads a catalog from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read or parsed, or if an
    /// entry has out-of-range coordinates.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::CatalogIo {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_yaml(&content)
    }

    /// Parses and validates catalog YAML.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` on parse or validation failure.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let file: SettlementsFile =
            serde_yaml::from_str(yaml).map_err(ConfigError::CatalogParse)?;
        for s in &file.settlements {
            if s.lat.abs() > 90.0 || s.lng.abs() > 180.0 {
                return Err(ConfigError::Validation(format!(
                    "settlement '{}': coordinates out of range",
                    s.name
                )));
            }
        }
        Ok(SettlementCatalog {
            entries: file.settlements,
        })
    }

    /// Settlements inside a bounding box, sorted by population descending
    /// (name as tie-break, so the order is stable).
    #[must_use]
    pub fn within(&self, bbox: &BoundingBox) -> Vec<Settlement> {
        let mut inside: Vec<Settlement> = self
            .entries
            .iter()
            .filter(|s| bbox.contains(s.lat, s.lng))
            .cloned()
            .collect();
        inside.sort_by(|a, b| b.population.cmp(&a.population).then(a.name.cmp(&b.name)));
        inside
    }

    #[must_use]
    pub fn entries(&self) -> &[Settlement] {
        &self.entries
    }
}
