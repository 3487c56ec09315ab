//! Per-candidate raw signal extraction.
//!
//! Works against a read-only store snapshot and the settlement catalog.
//! Optional signals (population, anchors, peer performance) stay `None`
//! when no data source applies; the scorer turns that into a completeness
//! penalty instead of a zero value. Urban signals are filled in separately
//! by the orchestrator because they come from an async provider.

use sitescout_core::{EngineConfig, RawFeatures, Settlement, Store};

use crate::geo::haversine_m;
use crate::grid::{heuristic_population, CandidatePoint};
use crate::providers::AnchorProvider;

/// A settlement match counts for population estimation within this radius.
const SETTLEMENT_MATCH_RADIUS_M: f64 = 15_000.0;

pub struct FeatureExtractor<'a> {
    stores: &'a [Store],
    settlements: &'a [Settlement],
    anchors: &'a dyn AnchorProvider,
    config: &'a EngineConfig,
    cell_size_m: f64,
}

impl<'a> FeatureExtractor<'a> {
    #[must_use]
    pub fn new(
        stores: &'a [Store],
        settlements: &'a [Settlement],
        anchors: &'a dyn AnchorProvider,
        config: &'a EngineConfig,
        cell_size_m: f64,
    ) -> Self {
        FeatureExtractor {
            stores,
            settlements,
            anchors,
            config,
            cell_size_m,
        }
    }

    /// Computes all synchronous signals for one candidate point.
    #[must_use]
    pub fn extract(&self, point: &CandidatePoint) -> RawFeatures {
        let mut nearest: Option<f64> = None;
        let mut within_5km = 0;
        let mut within_10km = 0;
        let mut within_15km = 0;

        // Peer performance: distance-weighted turnover average inside the
        // peer radius. Stores without turnover data contribute nothing.
        let mut peer_weight = 0.0_f64;
        let mut peer_sum = 0.0_f64;

        for store in self.stores {
            let d = haversine_m(point.lat, point.lng, store.lat, store.lng);
            if nearest.is_none_or(|n| d < n) {
                nearest = Some(d);
            }
            if d <= 5_000.0 {
                within_5km += 1;
            }
            if d <= 10_000.0 {
                within_10km += 1;
            }
            if d <= 15_000.0 {
                within_15km += 1;
            }
            if d <= self.config.peer_radius_m {
                if let Some(turnover) = store.turnover {
                    let weight = 1.0 / (1.0 + d / 1_000.0);
                    peer_weight += weight;
                    peer_sum += weight * turnover;
                }
            }
        }

        let peer_performance = (peer_weight > 0.0).then(|| peer_sum / peer_weight);

        RawFeatures {
            population: self.population_estimate(point),
            nearest_store_m: nearest,
            stores_within_5km: within_5km,
            stores_within_10km: within_10km,
            stores_within_15km: within_15km,
            anchor_count: self.anchors.anchor_count(point.lat, point.lng),
            peer_performance,
            urban: None,
        }
    }

    /// Population from the candidate's own settlement, the nearest
    /// settlement within the match radius, or the density-band heuristic.
    fn population_estimate(&self, point: &CandidatePoint) -> Option<u32> {
        if let Some(population) = point.settlement_population {
            return Some(population);
        }
        let mut best: Option<(f64, u32)> = None;
        for s in self.settlements {
            let d = haversine_m(point.lat, point.lng, s.lat, s.lng);
            if d <= SETTLEMENT_MATCH_RADIUS_M && best.is_none_or(|(bd, _)| d < bd) {
                best = Some((d, s.population));
            }
        }
        match best {
            Some((_, population)) => Some(population),
            None => Some(heuristic_population(self.cell_size_m)),
        }
    }
}

#[cfg(test)]
mod tests {
    use sitescout_core::CandidateOrigin;

    use super::*;
    use crate::providers::{NoAnchorData, StaticAnchorIndex};

    fn point(lat: f64, lng: f64) -> CandidatePoint {
        CandidatePoint {
            cell_id: 1,
            lat,
            lng,
            origin: CandidateOrigin::Grid,
            settlement_population: None,
        }
    }

    fn store(lat: f64, lng: f64, turnover: Option<f64>) -> Store {
        Store {
            lat,
            lng,
            turnover,
            population_band: None,
        }
    }

    fn berlin_settlement() -> Settlement {
        Settlement {
            name: "Berlin".to_owned(),
            lat: 52.52,
            lng: 13.405,
            population: 3_645_000,
        }
    }

    #[test]
    fn empty_snapshot_leaves_store_signals_unknown() {
        let config = EngineConfig::default();
        let extractor = FeatureExtractor::new(&[], &[], &NoAnchorData, &config, 5000.0);
        let features = extractor.extract(&point(52.5, 13.4));
        assert!(features.nearest_store_m.is_none());
        assert_eq!(features.stores_within_5km, 0);
        assert!(features.peer_performance.is_none());
        assert!(features.anchor_count.is_none());
    }

    #[test]
    fn nearest_store_and_radius_counts() {
        let config = EngineConfig::default();
        let stores = vec![
            store(52.52, 13.41, None),   // well inside 5 km
            store(52.55, 13.50, None),   // a few km out
            store(53.55, 9.99, None),    // Hamburg, far away
        ];
        let extractor = FeatureExtractor::new(&stores, &[], &NoAnchorData, &config, 1000.0);
        let features = extractor.extract(&point(52.52, 13.405));
        let nearest = features.nearest_store_m.unwrap();
        assert!(nearest < 1_000.0, "nearest: {nearest}");
        assert_eq!(features.stores_within_5km, 1);
        assert_eq!(features.stores_within_10km, 2);
        assert_eq!(features.stores_within_15km, 2);
    }

    #[test]
    fn peer_performance_weights_closer_stores_heavier() {
        let config = EngineConfig::default();
        // Close store with high turnover, farther store with low turnover.
        let stores = vec![
            store(52.525, 13.405, Some(2_000_000.0)),
            store(52.60, 13.405, Some(500_000.0)),
        ];
        let extractor = FeatureExtractor::new(&stores, &[], &NoAnchorData, &config, 1000.0);
        let features = extractor.extract(&point(52.52, 13.405));
        let peer = features.peer_performance.unwrap();
        assert!(peer > 1_250_000.0, "closer store should dominate: {peer}");
    }

    #[test]
    fn stores_without_turnover_leave_peer_unknown() {
        let config = EngineConfig::default();
        let stores = vec![store(52.52, 13.41, None)];
        let extractor = FeatureExtractor::new(&stores, &[], &NoAnchorData, &config, 1000.0);
        let features = extractor.extract(&point(52.52, 13.405));
        assert!(features.peer_performance.is_none());
    }

    #[test]
    fn population_prefers_settlement_anchor() {
        let config = EngineConfig::default();
        let settlements = [berlin_settlement()];
        let extractor = FeatureExtractor::new(&[], &settlements, &NoAnchorData, &config, 5000.0);
        let mut p = point(52.52, 13.41);
        p.settlement_population = Some(1_234_567);
        assert_eq!(extractor.extract(&p).population, Some(1_234_567));
    }

    #[test]
    fn population_matches_nearby_settlement() {
        let config = EngineConfig::default();
        let settlements = [berlin_settlement()];
        let extractor = FeatureExtractor::new(&[], &settlements, &NoAnchorData, &config, 5000.0);
        let features = extractor.extract(&point(52.53, 13.42));
        assert_eq!(features.population, Some(3_645_000));
    }

    #[test]
    fn population_falls_back_to_density_heuristic() {
        let config = EngineConfig::default();
        let settlements = [berlin_settlement()];
        let extractor = FeatureExtractor::new(&[], &settlements, &NoAnchorData, &config, 5000.0);
        // Far from Berlin: heuristic for very sparse cells.
        let features = extractor.extract(&point(48.0, 8.0));
        assert_eq!(features.population, Some(heuristic_population(5000.0)));
    }

    #[test]
    fn anchor_provider_counts_nearby_pois() {
        let config = EngineConfig::default();
        let anchors = StaticAnchorIndex::new(
            vec![(52.521, 13.406), (52.522, 13.407), (53.0, 14.0)],
            1_000.0,
        );
        let extractor = FeatureExtractor::new(&[], &[], &anchors, &config, 1000.0);
        let features = extractor.extract(&point(52.52, 13.405));
        assert_eq!(features.anchor_count, Some(2));
    }
}
