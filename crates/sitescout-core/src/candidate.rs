//! Candidate data model: raw features, urban signals, confidence bands.
//!
//! Optional signals are `Option<T>` so "unknown" is a first-class state —
//! the scorer treats a missing signal as a capped completeness penalty,
//! never as a zero value.

use serde::{Deserialize, Serialize};

/// Discretized confidence tier. Band assignment is a pure function of
/// confidence with inclusive lower edges, so the bands partition [0, 1]
/// with no gaps or overlaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
    InsufficientData,
}

impl ConfidenceBand {
    /// Assigns the band for a confidence value in [0, 1].
    #[must_use]
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.70 {
            ConfidenceBand::High
        } else if confidence >= 0.50 {
            ConfidenceBand::Medium
        } else if confidence >= 0.30 {
            ConfidenceBand::Low
        } else {
            ConfidenceBand::InsufficientData
        }
    }
}

/// Tri-state outcome of a boolean-like land-use check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LanduseCheck {
    Pass,
    Fail,
    Unknown,
}

/// Urban-suitability signals pulled through the external provider.
/// Any field may be absent when the provider returns partial data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UrbanSignals {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub road_distance_m: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub building_distance_m: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub landuse: Option<String>,
}

impl UrbanSignals {
    /// Checks the land-use classification against a deny list.
    /// Missing classification is `Unknown`, never a failure.
    #[must_use]
    pub fn landuse_check(&self, denied: &[&str]) -> LanduseCheck {
        match &self.landuse {
            None => LanduseCheck::Unknown,
            Some(kind) if denied.iter().any(|d| d.eq_ignore_ascii_case(kind)) => {
                LanduseCheck::Fail
            }
            Some(_) => LanduseCheck::Pass,
        }
    }
}

/// Where a candidate point came from: an adaptive grid cell centroid or a
/// named settlement anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateOrigin {
    Grid,
    Settlement,
}

/// Raw per-candidate signals computed by the feature extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFeatures {
    /// Population estimate from the nearest settlement, or a density-band
    /// heuristic. `None` when neither source applies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub population: Option<u32>,
    /// Haversine distance to the closest existing store, in meters.
    /// `None` when the snapshot contains no stores.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nearest_store_m: Option<f64>,
    pub stores_within_5km: usize,
    pub stores_within_10km: usize,
    pub stores_within_15km: usize,
    /// Nearby points of interest from the anchor provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor_count: Option<u32>,
    /// Distance-weighted average turnover of stores within the peer radius.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer_performance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urban: Option<UrbanSignals>,
}

impl RawFeatures {
    /// An empty feature set; every signal unknown.
    #[must_use]
    pub fn empty() -> Self {
        RawFeatures {
            population: None,
            nearest_store_m: None,
            stores_within_5km: 0,
            stores_within_10km: 0,
            stores_within_15km: 0,
            anchor_count: None,
            peer_performance: None,
            urban: None,
        }
    }
}

/// A prospective store location moving through the pipeline.
///
/// Created by the feature extractor, scored by the scorer, kept or dropped
/// by the spatial suppressor, optionally annotated by the reranker. The
/// `cell_id` is the stable secondary sort key behind every deterministic
/// ordering in the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// Stable identifier within one generation run: grid cells first
    /// (emission-independent, position-derived), settlements after.
    pub cell_id: u64,
    pub lat: f64,
    pub lng: f64,
    pub origin: CandidateOrigin,
    pub features: RawFeatures,
    /// Composite score in [0, 1].
    pub score: f64,
    /// Confidence in [0, 1]: score × data completeness.
    pub confidence: f64,
    pub band: ConfidenceBand,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_boundaries_are_inclusive_on_lower_edge() {
        assert_eq!(ConfidenceBand::from_confidence(0.70), ConfidenceBand::High);
        assert_eq!(
            ConfidenceBand::from_confidence(0.50),
            ConfidenceBand::Medium
        );
        assert_eq!(ConfidenceBand::from_confidence(0.30), ConfidenceBand::Low);
        assert_eq!(
            ConfidenceBand::from_confidence(0.2999),
            ConfidenceBand::InsufficientData
        );
    }

    #[test]
    fn bands_partition_confidence_space() {
        // Sweep [0, 1] and make sure each value lands in exactly one band
        // consistent with its neighbors.
        let mut previous = ConfidenceBand::InsufficientData;
        for step in 0..=1000 {
            let confidence = f64::from(step) / 1000.0;
            let band = ConfidenceBand::from_confidence(confidence);
            // Confidence only increases, so the band may only move "up".
            let rank = |b: ConfidenceBand| match b {
                ConfidenceBand::InsufficientData => 0,
                ConfidenceBand::Low => 1,
                ConfidenceBand::Medium => 2,
                ConfidenceBand::High => 3,
            };
            assert!(rank(band) >= rank(previous));
            previous = band;
        }
        assert_eq!(previous, ConfidenceBand::High);
    }

    #[test]
    fn band_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&ConfidenceBand::InsufficientData).unwrap();
        assert_eq!(json, "\"INSUFFICIENT_DATA\"");
    }

    #[test]
    fn landuse_check_is_tri_state() {
        let unknown = UrbanSignals::default();
        assert_eq!(unknown.landuse_check(&["industrial"]), LanduseCheck::Unknown);

        let denied = UrbanSignals {
            landuse: Some("Industrial".to_owned()),
            ..UrbanSignals::default()
        };
        assert_eq!(denied.landuse_check(&["industrial"]), LanduseCheck::Fail);

        let allowed = UrbanSignals {
            landuse: Some("commercial".to_owned()),
            ..UrbanSignals::default()
        };
        assert_eq!(allowed.landuse_check(&["industrial"]), LanduseCheck::Pass);
    }
}
