//! Composite scoring and confidence modeling.
//!
//! Each raw feature is normalized to [0, 1] through a fixed nonlinear
//! curve, combined with the caller's (renormalized) bias weights, then
//! attenuated multiplicatively when the 5 km neighborhood is saturated.
//! Confidence is score × data completeness, where completeness drops by a
//! capped amount per unknown signal and never falls below the configured
//! floor.

use sitescout_core::{Candidate, ConfidenceBand, EngineConfig, RawFeatures};

use crate::grid::CandidatePoint;

/// Per-factor normalized values, kept for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreBreakdown {
    pub population: f64,
    pub proximity_gap: f64,
    pub turnover: f64,
    pub completeness: f64,
    pub saturation_factor: f64,
}

/// Neutral value substituted into the weighted sum for an unknown signal.
/// The information loss is charged to completeness, not to the score.
const NEUTRAL: f64 = 0.5;

pub struct Scorer<'a> {
    config: &'a EngineConfig,
    w_population: f64,
    w_proximity: f64,
    w_turnover: f64,
    /// Whether urban signals count toward expected completeness.
    urban_expected: bool,
}

impl<'a> Scorer<'a> {
    #[must_use]
    pub fn new(
        config: &'a EngineConfig,
        weights: (f64, f64, f64),
        urban_expected: bool,
    ) -> Self {
        let (w_population, w_proximity, w_turnover) = weights;
        Scorer {
            config,
            w_population,
            w_proximity,
            w_turnover,
            urban_expected,
        }
    }

    /// Scores one candidate, producing the immutable pipeline record.
    #[must_use]
    pub fn score(&self, point: &CandidatePoint, features: RawFeatures) -> (Candidate, ScoreBreakdown) {
        let population = features
            .population
            .map_or(NEUTRAL, |p| self.normalize_population(p));
        let proximity_gap = self.proximity_gap(features.nearest_store_m);
        let turnover = features
            .peer_performance
            .map_or(NEUTRAL, |t| self.normalize_turnover(t));

        let weighted = self.w_population * population
            + self.w_proximity * proximity_gap
            + self.w_turnover * turnover;

        let saturation_factor = self.saturation_factor(features.stores_within_5km);
        let score = (weighted * saturation_factor).clamp(0.0, 1.0);

        let completeness = self.completeness(&features);
        let confidence = (score * completeness).clamp(0.0, 1.0);
        let band = ConfidenceBand::from_confidence(confidence);

        let breakdown = ScoreBreakdown {
            population,
            proximity_gap,
            turnover,
            completeness,
            saturation_factor,
        };

        let candidate = Candidate {
            cell_id: point.cell_id,
            lat: point.lat,
            lng: point.lng,
            origin: point.origin,
            features,
            score,
            confidence,
            band,
            rationale: None,
        };
        (candidate, breakdown)
    }

    /// Log curve against the max-population anchor: doubling a small town
    /// matters, doubling a metropolis barely moves the needle.
    fn normalize_population(&self, population: u32) -> f64 {
        let anchor = f64::from(self.config.max_population_anchor);
        (f64::from(population).ln_1p() / anchor.ln_1p()).clamp(0.0, 1.0)
    }

    /// Sigmoid over distance-to-nearest-store. Very close distances
    /// saturate toward 0 (no gap), very far toward 1 (open market).
    /// No stores at all is a fully open market.
    fn proximity_gap(&self, nearest_store_m: Option<f64>) -> f64 {
        let Some(d) = nearest_store_m else {
            return 1.0;
        };
        let x = (d - self.config.proximity_midpoint_m) / self.config.proximity_steepness_m;
        1.0 / (1.0 + (-x).exp())
    }

    /// Linear against the reference peer average, parity at 0.5.
    fn normalize_turnover(&self, peer_turnover: f64) -> f64 {
        (peer_turnover / (2.0 * self.config.reference_turnover)).clamp(0.0, 1.0)
    }

    /// Multiplicative attenuation once the 5 km store count exceeds the
    /// saturation threshold; exponent capped so a pathological cluster
    /// cannot underflow the score to zero.
    fn saturation_factor(&self, stores_within_5km: usize) -> f64 {
        if stores_within_5km <= self.config.saturation_threshold {
            return 1.0;
        }
        let excess = (stores_within_5km - self.config.saturation_threshold).min(5);
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let exponent = excess as i32;
        self.config.saturation_attenuation.powi(exponent)
    }

    /// Fraction of expected signals actually available, with a capped
    /// penalty per unknown and the configured floor.
    fn completeness(&self, features: &RawFeatures) -> f64 {
        let mut expected = 3usize; // population, anchors, peer performance
        let mut unknown = 0usize;
        if features.population.is_none() {
            unknown += 1;
        }
        if features.anchor_count.is_none() {
            unknown += 1;
        }
        if features.peer_performance.is_none() {
            unknown += 1;
        }
        if self.urban_expected {
            expected += 3;
            match &features.urban {
                None => unknown += 3,
                Some(urban) => {
                    if urban.road_distance_m.is_none() {
                        unknown += 1;
                    }
                    if urban.building_distance_m.is_none() {
                        unknown += 1;
                    }
                    if urban.landuse.is_none() {
                        unknown += 1;
                    }
                }
            }
        }
        #[allow(clippy::cast_precision_loss)]
        let per_unknown = (1.0 / expected as f64).min(self.config.unknown_signal_penalty_cap);
        #[allow(clippy::cast_precision_loss)]
        let completeness = 1.0 - per_unknown * unknown as f64;
        completeness.max(self.config.completeness_floor)
    }
}

#[cfg(test)]
mod tests {
    use sitescout_core::{CandidateOrigin, UrbanSignals};

    use super::*;

    fn point(cell_id: u64) -> CandidatePoint {
        CandidatePoint {
            cell_id,
            lat: 52.52,
            lng: 13.405,
            origin: CandidateOrigin::Grid,
            settlement_population: None,
        }
    }

    fn full_features() -> RawFeatures {
        RawFeatures {
            population: Some(500_000),
            nearest_store_m: Some(8_000.0),
            stores_within_5km: 0,
            stores_within_10km: 1,
            stores_within_15km: 2,
            anchor_count: Some(4),
            peer_performance: Some(1_000_000.0),
            urban: None,
        }
    }

    fn scorer(config: &EngineConfig) -> Scorer<'_> {
        Scorer::new(config, (0.5, 0.3, 0.2), false)
    }

    #[test]
    fn score_and_confidence_stay_in_unit_interval() {
        let config = EngineConfig::default();
        let s = scorer(&config);
        let (candidate, _) = s.score(&point(1), full_features());
        assert!((0.0..=1.0).contains(&candidate.score));
        assert!((0.0..=1.0).contains(&candidate.confidence));
    }

    #[test]
    fn fully_known_candidate_has_full_completeness() {
        let config = EngineConfig::default();
        let s = scorer(&config);
        let (candidate, breakdown) = s.score(&point(1), full_features());
        assert!((breakdown.completeness - 1.0).abs() < f64::EPSILON);
        assert!((candidate.confidence - candidate.score).abs() < 1e-12);
    }

    #[test]
    fn population_curve_is_log_shaped() {
        let config = EngineConfig::default();
        let s = scorer(&config);
        let small = s.normalize_population(10_000);
        let medium = s.normalize_population(100_000);
        let large = s.normalize_population(1_000_000);
        assert!(small < medium && medium < large);
        // Concave: the same +90k residents gain less higher up the curve.
        let lower_gain = s.normalize_population(100_000) - s.normalize_population(10_000);
        let upper_gain = s.normalize_population(190_000) - s.normalize_population(100_000);
        assert!(lower_gain > upper_gain);
    }

    #[test]
    fn proximity_gap_saturates_at_both_ends() {
        let config = EngineConfig::default();
        let s = scorer(&config);
        assert!(s.proximity_gap(Some(50.0)) < 0.1);
        assert!(s.proximity_gap(Some(50_000.0)) > 0.95);
        assert!((s.proximity_gap(None) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn saturation_attenuates_multiplicatively() {
        let config = EngineConfig::default();
        let s = scorer(&config);
        let mut crowded = full_features();
        crowded.stores_within_5km = config.saturation_threshold + 2;
        let (attenuated, breakdown) = s.score(&point(1), crowded);
        let (baseline, _) = s.score(&point(1), full_features());
        let expected_factor = config.saturation_attenuation.powi(2);
        assert!((breakdown.saturation_factor - expected_factor).abs() < 1e-12);
        assert!(attenuated.score < baseline.score);
    }

    #[test]
    fn unknown_signals_penalize_confidence_not_score() {
        let config = EngineConfig::default();
        let s = scorer(&config);
        let mut sparse = full_features();
        sparse.anchor_count = None;
        sparse.peer_performance = None;
        let (candidate, breakdown) = s.score(&point(1), sparse);
        assert!(breakdown.completeness < 1.0);
        assert!(candidate.confidence < candidate.score);
    }

    #[test]
    fn completeness_never_falls_below_floor() {
        let config = EngineConfig::default();
        let s = Scorer::new(&config, (0.5, 0.3, 0.2), true);
        let all_unknown = RawFeatures::empty();
        let (_, breakdown) = s.score(&point(1), all_unknown);
        assert!(breakdown.completeness >= config.completeness_floor);
    }

    #[test]
    fn per_unknown_penalty_is_capped() {
        let config = EngineConfig::default();
        let s = scorer(&config); // urban not expected: 3 signals
        let mut sparse = full_features();
        sparse.anchor_count = None;
        let (_, breakdown) = s.score(&point(1), sparse);
        // One unknown of three: raw fraction would be 1/3, cap is 0.20.
        assert!((breakdown.completeness - 0.80).abs() < 1e-12);
    }

    #[test]
    fn partial_urban_signals_count_individually() {
        let config = EngineConfig::default();
        let s = Scorer::new(&config, (0.5, 0.3, 0.2), true);
        let mut features = full_features();
        features.urban = Some(UrbanSignals {
            road_distance_m: Some(120.0),
            building_distance_m: None,
            landuse: Some("commercial".to_owned()),
        });
        let (_, breakdown) = s.score(&point(1), features);
        // Six expected, one unknown: 1 - 1/6.
        assert!((breakdown.completeness - (1.0 - 1.0 / 6.0)).abs() < 1e-12);
    }

    #[test]
    fn identical_confidence_lands_in_identical_band() {
        let config = EngineConfig::default();
        let s = scorer(&config);
        let (a, _) = s.score(&point(1), full_features());
        let (b, _) = s.score(&point(2), full_features());
        assert!((a.confidence - b.confidence).abs() < f64::EPSILON);
        assert_eq!(a.band, b.band);
    }
}
