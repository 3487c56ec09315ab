//! Greedy spatial non-maximum suppression.
//!
//! Candidates are visited best-first (score descending, cell id ascending
//! as the deterministic tie-break) and accepted only when they keep the
//! minimum separation from every previously accepted point and every
//! external blocker. Blockers let the orchestrator run suppression per
//! batch while honoring acceptances from earlier batches.

use sitescout_core::Candidate;

use crate::geo::haversine_m;

#[derive(Debug, Default)]
pub struct Selection {
    pub accepted: Vec<Candidate>,
    pub rejected: usize,
}

/// Orders candidate indices best-first with a stable tie-break.
fn ranked_indices(candidates: &[Candidate]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|&a, &b| {
        candidates[b]
            .score
            .total_cmp(&candidates[a].score)
            .then_with(|| candidates[a].cell_id.cmp(&candidates[b].cell_id))
    });
    order
}

pub struct Suppressor {
    min_distance_m: f64,
}

impl Suppressor {
    #[must_use]
    pub fn new(min_distance_m: f64) -> Self {
        Suppressor { min_distance_m }
    }

    /// Selects up to `limit` candidates, none closer than the minimum
    /// separation to each other or to any blocker. A non-positive minimum
    /// disables the spatial check and keeps only the ranking and limit.
    #[must_use]
    pub fn select(
        &self,
        candidates: &[Candidate],
        blockers: &[(f64, f64)],
        limit: usize,
    ) -> Selection {
        let mut selection = Selection::default();
        for index in ranked_indices(candidates) {
            if selection.accepted.len() >= limit {
                break;
            }
            let candidate = &candidates[index];
            if self.min_distance_m > 0.0 && self.too_close(candidate, blockers, &selection.accepted)
            {
                selection.rejected += 1;
                continue;
            }
            selection.accepted.push(candidate.clone());
        }
        selection
    }

    fn too_close(
        &self,
        candidate: &Candidate,
        blockers: &[(f64, f64)],
        accepted: &[Candidate],
    ) -> bool {
        let blocked_by_fixed = blockers
            .iter()
            .any(|(lat, lng)| haversine_m(candidate.lat, candidate.lng, *lat, *lng) < self.min_distance_m);
        if blocked_by_fixed {
            return true;
        }
        accepted
            .iter()
            .any(|a| haversine_m(candidate.lat, candidate.lng, a.lat, a.lng) < self.min_distance_m)
    }
}

#[cfg(test)]
mod tests {
    use sitescout_core::{CandidateOrigin, ConfidenceBand, RawFeatures};

    use super::*;

    fn candidate(cell_id: u64, lat: f64, lng: f64, score: f64) -> Candidate {
        Candidate {
            cell_id,
            lat,
            lng,
            origin: CandidateOrigin::Grid,
            features: RawFeatures::empty(),
            score,
            confidence: score,
            band: ConfidenceBand::from_confidence(score),
            rationale: None,
        }
    }

    #[test]
    fn keeps_the_best_of_a_close_pair() {
        // Two candidates ~150 m apart, 5 km separation required.
        let candidates = vec![
            candidate(1, 52.520, 13.405, 0.6),
            candidate(2, 52.5213, 13.405, 0.9),
        ];
        let selection = Suppressor::new(5_000.0).select(&candidates, &[], 10);
        assert_eq!(selection.accepted.len(), 1);
        assert_eq!(selection.accepted[0].cell_id, 2);
        assert_eq!(selection.rejected, 1);
    }

    #[test]
    fn distant_candidates_all_survive() {
        let candidates = vec![
            candidate(1, 52.52, 13.405, 0.6),   // Berlin
            candidate(2, 53.55, 9.99, 0.7),     // Hamburg
            candidate(3, 48.14, 11.58, 0.8),    // Munich
        ];
        let selection = Suppressor::new(5_000.0).select(&candidates, &[], 10);
        assert_eq!(selection.accepted.len(), 3);
        assert_eq!(selection.rejected, 0);
    }

    #[test]
    fn accepted_order_is_best_first() {
        let candidates = vec![
            candidate(1, 52.52, 13.405, 0.6),
            candidate(2, 53.55, 9.99, 0.9),
            candidate(3, 48.14, 11.58, 0.7),
        ];
        let selection = Suppressor::new(5_000.0).select(&candidates, &[], 10);
        let ids: Vec<u64> = selection.accepted.iter().map(|c| c.cell_id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn equal_scores_break_ties_by_cell_id() {
        let candidates = vec![
            candidate(9, 52.52, 13.405, 0.5),
            candidate(3, 53.55, 9.99, 0.5),
            candidate(7, 48.14, 11.58, 0.5),
        ];
        let selection = Suppressor::new(0.0).select(&candidates, &[], 10);
        let ids: Vec<u64> = selection.accepted.iter().map(|c| c.cell_id).collect();
        assert_eq!(ids, vec![3, 7, 9]);
    }

    #[test]
    fn blockers_suppress_nearby_candidates() {
        let candidates = vec![candidate(1, 52.52, 13.405, 0.9)];
        let blockers = vec![(52.521, 13.406)];
        let selection = Suppressor::new(5_000.0).select(&candidates, &blockers, 10);
        assert!(selection.accepted.is_empty());
        assert_eq!(selection.rejected, 1);
    }

    #[test]
    fn non_positive_min_distance_disables_the_spatial_check() {
        let candidates = vec![
            candidate(1, 52.520, 13.405, 0.6),
            candidate(2, 52.5201, 13.4051, 0.9),
        ];
        let selection = Suppressor::new(0.0).select(&candidates, &[(52.52, 13.405)], 10);
        assert_eq!(selection.accepted.len(), 2);
    }

    #[test]
    fn limit_caps_acceptances() {
        let candidates = vec![
            candidate(1, 52.52, 13.405, 0.6),
            candidate(2, 53.55, 9.99, 0.9),
            candidate(3, 48.14, 11.58, 0.7),
        ];
        let selection = Suppressor::new(5_000.0).select(&candidates, &[], 2);
        assert_eq!(selection.accepted.len(), 2);
        let ids: Vec<u64> = selection.accepted.iter().map(|c| c.cell_id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn input_slice_is_untouched() {
        let candidates = vec![
            candidate(2, 53.55, 9.99, 0.9),
            candidate(1, 52.52, 13.405, 0.6),
        ];
        let before = candidates.clone();
        let _ = Suppressor::new(5_000.0).select(&candidates, &[], 10);
        assert_eq!(candidates, before);
    }
}
