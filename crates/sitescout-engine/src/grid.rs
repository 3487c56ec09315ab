//! Adaptive grid builder with incremental, seed-deterministic emission.
//!
//! Discretizes a bounding box into cells whose size is inversely
//! proportional to the region's store density, then emits one candidate
//! point per cell in a seed-shuffled order. The shuffle spreads early
//! batches across the whole region instead of scanning row by row, which
//! keeps the iterative-expansion loop from clustering its first
//! acceptances in one corner. Settlement-anchored candidates are
//! interleaved at a target ratio.
//!
//! Emission is incremental: a cursor guarantees `next_batch` never
//! re-emits a cell, so the orchestrator can keep asking for more.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use sitescout_core::{BoundingBox, CandidateOrigin, Settlement};

use crate::geo;

/// Cell sizes per store-density band, in meters.
const CELL_VERY_SPARSE_M: f64 = 5000.0;
const CELL_SPARSE_M: f64 = 2000.0;
const CELL_MODERATE_M: f64 = 1000.0;
const CELL_DENSE_M: f64 = 500.0;

/// Caps the raw grid so a sparse continent-scale box cannot explode the
/// candidate universe; emission order is shuffled, so the cap thins the
/// grid uniformly.
const MAX_GRID_CELLS: usize = 250_000;

/// One emitted candidate point, before feature extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidatePoint {
    /// Stable id: grid cells carry their row-major index, settlement
    /// anchors follow after the last grid index.
    pub cell_id: u64,
    pub lat: f64,
    pub lng: f64,
    pub origin: CandidateOrigin,
    /// Population carried over for settlement-anchored points.
    pub settlement_population: Option<u32>,
}

/// Picks the cell size for a store density in stores/km².
#[must_use]
pub fn cell_size_for_density(stores_per_km2: f64) -> f64 {
    if stores_per_km2 < 0.01 {
        CELL_VERY_SPARSE_M
    } else if stores_per_km2 < 0.1 {
        CELL_SPARSE_M
    } else if stores_per_km2 < 1.0 {
        CELL_MODERATE_M
    } else {
        CELL_DENSE_M
    }
}

/// Rough population guess for a grid cell when no settlement matches,
/// keyed off the density band the region resolved to.
#[must_use]
pub fn heuristic_population(cell_size_m: f64) -> u32 {
    if cell_size_m >= CELL_VERY_SPARSE_M {
        2_000
    } else if cell_size_m >= CELL_SPARSE_M {
        10_000
    } else if cell_size_m >= CELL_MODERATE_M {
        50_000
    } else {
        150_000
    }
}

pub struct GridBuilder {
    /// Grid cell (id, lat, lng) triples in seed-shuffled emission order.
    cells: Vec<(u64, f64, f64)>,
    settlements: Vec<Settlement>,
    first_settlement_id: u64,
    cell_size_m: f64,
    settlement_ratio: f64,
    grid_cursor: usize,
    settlement_cursor: usize,
    emitted: usize,
}

impl GridBuilder {
    /// Builds the cell universe for `bbox` at a resolution chosen from the
    /// observed store density. Returns `None` when the box has zero area —
    /// the caller surfaces that as a `NO_REGION_DATA` result.
    #[must_use]
    pub fn new(
        bbox: &BoundingBox,
        stores_per_km2: f64,
        settlements: Vec<Settlement>,
        settlement_ratio: f64,
        seed: u64,
    ) -> Option<Self> {
        if bbox.area_km2() <= 0.0 {
            return None;
        }
        let cell_size_m = cell_size_for_density(stores_per_km2);

        let lat_step = geo::lat_degrees_for_meters(cell_size_m);
        let mid_lat = f64::midpoint(bbox.north, bbox.south);
        let lng_step = geo::lng_degrees_for_meters(cell_size_m, mid_lat);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let rows = (((bbox.north - bbox.south) / lat_step).ceil() as usize).max(1);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let cols = (((bbox.east - bbox.west).abs() / lng_step).ceil() as usize).max(1);

        // Stride the grid down to the cap rather than truncating it, so the
        // kept cells still cover the whole box.
        let total = rows.saturating_mul(cols);
        let stride = total.div_ceil(MAX_GRID_CELLS).max(1);

        let mut cells = Vec::with_capacity(total.min(MAX_GRID_CELLS));
        for index in (0..total).step_by(stride) {
            let row = index / cols;
            let col = index % cols;
            #[allow(clippy::cast_precision_loss)]
            let lat = bbox.south + (row as f64 + 0.5) * lat_step;
            #[allow(clippy::cast_precision_loss)]
            let lng = bbox.west + (col as f64 + 0.5) * lng_step;
            if lat <= bbox.north && lng <= bbox.east {
                cells.push((index as u64, lat, lng));
            }
        }
        if cells.is_empty() {
            return None;
        }

        let mut rng = StdRng::seed_from_u64(seed);
        cells.shuffle(&mut rng);

        let first_settlement_id = total as u64;
        Some(GridBuilder {
            cells,
            settlements,
            first_settlement_id,
            cell_size_m,
            settlement_ratio,
            grid_cursor: 0,
            settlement_cursor: 0,
            emitted: 0,
        })
    }

    #[must_use]
    pub fn cell_size_m(&self) -> f64 {
        self.cell_size_m
    }

    #[must_use]
    pub fn total_cells(&self) -> usize {
        self.cells.len() + self.settlements.len()
    }

    #[must_use]
    pub fn exhausted(&self) -> bool {
        self.grid_cursor >= self.cells.len() && self.settlement_cursor >= self.settlements.len()
    }

    /// Emits up to `n` new candidate points. Never re-emits a cell.
    ///
    /// Settlement anchors (highest population first) are interleaved so
    /// their share of all emitted points tracks the configured target
    /// ratio; grid centroids fill the rest.
    pub fn next_batch(&mut self, n: usize) -> Vec<CandidatePoint> {
        let mut out = Vec::with_capacity(n);
        while out.len() < n && !self.exhausted() {
            let grid_left = self.grid_cursor < self.cells.len();
            let settlements_left = self.settlement_cursor < self.settlements.len();

            #[allow(clippy::cast_precision_loss)]
            let settlement_due = (self.settlement_cursor as f64)
                < self.settlement_ratio * (self.emitted as f64 + 1.0);

            if settlements_left && (settlement_due || !grid_left) {
                let s = &self.settlements[self.settlement_cursor];
                out.push(CandidatePoint {
                    cell_id: self.first_settlement_id + self.settlement_cursor as u64,
                    lat: s.lat,
                    lng: s.lng,
                    origin: CandidateOrigin::Settlement,
                    settlement_population: Some(s.population),
                });
                self.settlement_cursor += 1;
            } else {
                let (id, lat, lng) = self.cells[self.grid_cursor];
                out.push(CandidatePoint {
                    cell_id: id,
                    lat,
                    lng,
                    origin: CandidateOrigin::Grid,
                    settlement_population: None,
                });
                self.grid_cursor += 1;
            }
            self.emitted += 1;
        }
        out
    }
}
