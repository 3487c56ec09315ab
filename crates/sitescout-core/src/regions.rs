//! Named-region catalog: countries and states resolvable to bounding boxes.
//!
//! A built-in catalog ships embedded in the binary; deployments can point
//! `SITESCOUT_REGIONS_PATH` at a YAML file to extend or replace it.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

const BUILTIN_REGIONS: &str = include_str!("../../../config/regions.yaml");

/// A geographic bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl BoundingBox {
    /// Approximate area in km², using the cosine of the mid latitude for
    /// the east/west span.
    #[must_use]
    pub fn area_km2(&self) -> f64 {
        const KM_PER_DEGREE: f64 = 111.32;
        let height_km = (self.north - self.south) * KM_PER_DEGREE;
        let mid_lat = f64::midpoint(self.north, self.south);
        let width_km = (self.east - self.west).abs() * KM_PER_DEGREE * mid_lat.to_radians().cos();
        (height_km * width_km).max(0.0)
    }

    #[must_use]
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        lat <= self.north && lat >= self.south && lng <= self.east && lng >= self.west
    }
}

/// One catalog entry: a named country or state with its extent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionEntry {
    pub name: String,
    pub code: String,
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl RegionEntry {
    #[must_use]
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox {
            north: self.north,
            south: self.south,
            east: self.east,
            west: self.west,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RegionsFile {
    regions: Vec<RegionEntry>,
}

/// The loaded, validated region catalog.
#[derive(Debug, Clone)]
pub struct RegionCatalog {
    entries: Vec<RegionEntry>,
}

impl RegionCatalog {
    /// Loads the catalog embedded at build time.
    ///
    /// # Panics
    ///
    /// Panics if the embedded YAML is malformed — a build defect, not a
    /// runtime condition.
    #[must_use]
    pub fn builtin() -> Self {
        Self::from_yaml(BUILTIN_REGIONS).expect("embedded regions.yaml must be valid")
    }

    /// Loads and validates a catalog from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read, parsed, or fails
    /// validation (out-of-range coordinates, inverted boxes, duplicates).
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
    /// Returns `ConfigError` on parse failure or validation failure.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let file: RegionsFile = serde_yaml::from_str(yaml).map_err(ConfigError::CatalogParse)?;
        validate_entries(&file.regions)?;
        Ok(RegionCatalog {
            entries: file.regions,
        })
    }

    /// Resolves a region by name or code, case-insensitively.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<BoundingBox> {
        let needle = name.trim();
        self.entries
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(needle) || e.code.eq_ignore_ascii_case(needle))
            .map(RegionEntry::bounding_box)
    }

    #[must_use]
    pub fn entries(&self) -> &[RegionEntry] {
        &self.entries
    }
}

fn validate_entries(entries: &[RegionEntry]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for entry in entries {
        if entry.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "region name must be non-empty".to_owned(),
            ));
        }
        if entry.north <= entry.south {
            return Err(ConfigError::Validation(format!(
                "region '{}': north ({}) must be greater than south ({})",
                entry.name, entry.north, entry.south
            )));
        }
        if entry.north.abs() > 90.0 || entry.south.abs() > 90.0 {
            return Err(ConfigError::Validation(format!(
                "region '{}': latitude out of range",
                entry.name
            )));
        }
        if entry.east.abs() > 180.0 || entry.west.abs() > 180.0 {
            return Err(ConfigError::Validation(format!(
                "region '{}': longitude out of range",
                entry.name
            )));
        }
        if !seen.insert(entry.name.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate region name: '{}'",
                entry.name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_loads_and_validates() {
        let catalog = RegionCatalog::builtin();
        assert!(!catalog.entries().is_empty());
    }

    #[test]
    fn resolve_by_name_is_case_insensitive() {
        let catalog = RegionCatalog::builtin();
        let bbox = catalog.resolve("germany").expect("Germany should resolve");
        assert!(bbox.north > bbox.south);
        assert!(bbox.contains(52.52, 13.40), "Berlin should be inside");
    }

    #[test]
    fn resolve_by_code() {
        let catalog = RegionCatalog::builtin();
        assert!(catalog.resolve("DE").is_some());
        assert!(catalog.resolve("de-by").is_some());
    }

    #[test]
    fn unknown_region_does_not_resolve() {
        let catalog = RegionCatalog::builtin();
        assert!(catalog.resolve("Atlantis").is_none());
    }

    #[test]
    fn inverted_box_rejected() {
        let yaml = r"
regions:
  - name: Broken
    code: XX
    north: 10.0
    south: 20.0
    east: 5.0
    west: 0.0
";
        let err = RegionCatalog::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("north"));
    }

    #[test]
    fn duplicate_name_rejected() {
        let yaml = r"
regions:
  - name: Twice
    code: T1
    north: 10.0
    south: 0.0
    east: 5.0
    west: 0.0
  - name: twice
    code: T2
    north: 10.0
    south: 0.0
    east: 5.0
    west: 0.0
";
        let err = RegionCatalog::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn germany_area_is_plausible() {
        let catalog = RegionCatalog::builtin();
        let bbox = catalog.resolve("Germany").unwrap();
        let area = bbox.area_km2();
        // Coarse bounding box, so larger than the country's true area.
        assert!(area > 350_000.0 && area < 700_000.0, "area: {area}");
    }
}
