//! The generation orchestrator: grid → features → urban filter → score →
//! suppress → rerank → suggestions.
//!
//! One run is driven by an iterative-expansion loop: batches of candidate
//! points are pulled from the grid builder, evaluated, and suppressed
//! against everything accepted so far; the batch size grows geometrically
//! until the acceptance pool is full, the candidate budget is spent, the
//! deadline passes, or the grid is exhausted. All external trouble
//! (unresolvable region, provider outages, LLM failures) degrades the
//! result and is recorded in the metadata; only invalid parameters and
//! broken configuration are errors.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, info, warn};
use uuid::Uuid;

use sitescout_core::{
    BoundingBox, Candidate, CandidateOrigin, EngineConfig, ExpansionStats, FeaturesEnabled,
    GenerationMetadata, GenerationParams, GenerationResult, LanduseCheck, MixingStats,
    PerformanceMetrics, RegionCatalog, RegionFilter, Scenario, SettlementCatalog, Store,
    Suggestion, SuggestionStatus,
};
use sitescout_strategy::{LlmClient, RankedPick, RerankStats, StrategyReranker};

use crate::error::EngineError;
use crate::features::FeatureExtractor;
use crate::grid::GridBuilder;
use crate::nms::Suppressor;
use crate::providers::{AnchorProvider, MapboxClient, NoAnchorData, UrbanDisabled, UrbanProvider};
use crate::score::Scorer;

/// The acceptance pool holds this many times the target, so the reranker
/// has real alternatives to choose from.
const POOL_FACTOR: usize = 3;

/// Metadata note for runs over a region the engine has no data for.
const NOTE_NO_REGION_DATA: &str = "NO_REGION_DATA";

pub struct ExpansionEngine {
    config: EngineConfig,
    regions: RegionCatalog,
    settlements: SettlementCatalog,
    anchors: Arc<dyn AnchorProvider>,
    urban: Arc<dyn UrbanProvider>,
    reranker: Option<StrategyReranker>,
}

impl ExpansionEngine {
    /// Builds an engine from configuration: catalogs from their override
    /// paths or the embedded defaults, providers from whichever credentials
    /// are present. Missing credentials disable the corresponding feature
    /// rather than failing.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] when a catalog override path cannot
    /// be loaded.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let regions = match &config.regions_path {
            Some(path) => RegionCatalog::load(path)?,
            None => RegionCatalog::builtin(),
        };
        let settlements = match &config.settlements_path {
            Some(path) => SettlementCatalog::load(path)?,
            None => SettlementCatalog::builtin(),
        };

        let urban: Arc<dyn UrbanProvider> = match MapboxClient::from_config(&config) {
            Some(client) => Arc::new(client),
            None => {
                debug!("no Mapbox token configured, urban filtering disabled");
                Arc::new(UrbanDisabled)
            }
        };

        let reranker = config.openai_api_key.as_ref().and_then(|key| {
            match LlmClient::with_base_url(
                key,
                &config.openai_model,
                config.llm_timeout_ms,
                &config.openai_base_url,
            ) {
                Ok(client) => Some(StrategyReranker::new(
                    client,
                    config.llm_max_retries,
                    config.llm_backoff_base_ms,
                )),
                Err(error) => {
                    warn!(%error, "chat client construction failed, AI reranking disabled");
                    None
                }
            }
        });

        Ok(ExpansionEngine {
            config,
            regions,
            settlements,
            anchors: Arc::new(NoAnchorData),
            urban,
            reranker,
        })
    }

    /// Builds an engine from explicit parts. Tests use this to inject
    /// catalogs, providers, and a mock-backed reranker.
    #[must_use]
    pub fn with_parts(
        config: EngineConfig,
        regions: RegionCatalog,
        settlements: SettlementCatalog,
        anchors: Arc<dyn AnchorProvider>,
        urban: Arc<dyn UrbanProvider>,
        reranker: Option<StrategyReranker>,
    ) -> Self {
        ExpansionEngine {
            config,
            regions,
            settlements,
            anchors,
            urban,
            reranker,
        }
    }

    /// Runs one generation over a read-only store snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidParameters`] when the parameters fail
    /// validation. Every other condition produces an `Ok` result whose
    /// metadata explains what degraded.
    pub async fn generate(
        &self,
        params: &GenerationParams,
        stores: &[Store],
    ) -> Result<GenerationResult, EngineError> {
        params.validate()?;
        let started = Instant::now();
        let deadline = started + Duration::from_millis(self.config.generation_timeout_ms);

        let Some(bbox) = self.resolve_region(&params.region) else {
            warn!(region = ?params.region, "region not in catalog, returning empty result");
            return Ok(empty_result(self.config.settlement_ratio, params.seed, started));
        };

        let region_stores: Vec<Store> = stores
            .iter()
            .filter(|s| bbox.contains(s.lat, s.lng))
            .cloned()
            .collect();
        #[allow(clippy::cast_precision_loss)]
        let stores_per_km2 = region_stores.len() as f64 / bbox.area_km2().max(1.0);

        let region_settlements = self.settlements.within(&bbox);
        let Some(mut builder) = GridBuilder::new(
            &bbox,
            stores_per_km2,
            region_settlements.clone(),
            self.config.settlement_ratio,
            params.seed,
        ) else {
            warn!("region resolves to an empty grid, returning empty result");
            return Ok(empty_result(self.config.settlement_ratio, params.seed, started));
        };

        let urban_active = params.toggles.enable_urban_filtering && self.urban.is_enabled();
        let extractor = FeatureExtractor::new(
            &region_stores,
            &region_settlements,
            self.anchors.as_ref(),
            &self.config,
            builder.cell_size_m(),
        );
        let scorer = Scorer::new(&self.config, params.normalized_biases(), urban_active);
        let suppressor = Suppressor::new(params.min_distance_m);

        let target = params.target();
        let pool_cap = target.saturating_mul(POOL_FACTOR);

        let mut accepted: Vec<Candidate> = Vec::new();
        let mut rejection_reasons: BTreeMap<String, u64> = BTreeMap::new();
        let mut stats = ExpansionStats::default();
        let mut scored_cells = 0usize;
        let mut batch_size = self.config.initial_batch.max(1);

        while accepted.len() < pool_cap && !builder.exhausted() {
            if Instant::now() >= deadline {
                stats.timeout_reached = true;
                break;
            }
            if stats.total_evaluated >= self.config.max_candidates {
                stats.max_candidates_reached = true;
                break;
            }

            let room = self.config.max_candidates - stats.total_evaluated;
            let points = builder.next_batch(batch_size.min(room));
            if points.is_empty() {
                break;
            }
            stats.iterations += 1;
            stats.total_evaluated += points.len();

            let mut features: Vec<_> = points.iter().map(|p| extractor.extract(p)).collect();
            if urban_active {
                let remaining = deadline.saturating_duration_since(Instant::now());
                let probes = tokio::time::timeout(
                    remaining,
                    join_all(points.iter().map(|p| self.urban.probe(p.lat, p.lng))),
                )
                .await;
                match probes {
                    Ok(probes) => {
                        for (feature, probe) in features.iter_mut().zip(probes) {
                            match probe {
                                Ok(signals) => feature.urban = signals,
                                Err(error) => {
                                    warn!(%error, "urban probe failed, continuing without signals");
                                }
                            }
                        }
                    }
                    Err(_) => {
                        warn!("urban probes exceeded the deadline, batch scored without signals");
                    }
                }
            }

            let mut scored: Vec<Candidate> = Vec::with_capacity(points.len());
            for (point, feature) in points.iter().zip(features) {
                if urban_active {
                    if let Some(reason) = self.urban_rejection(&feature) {
                        *rejection_reasons.entry(reason.to_owned()).or_insert(0) += 1;
                        stats.total_rejected += 1;
                        continue;
                    }
                }
                let (candidate, _) = scorer.score(point, feature);
                scored.push(candidate);
            }
            scored_cells += scored.len();

            let selection = suppressor.select(
                &scored,
                &accepted
                    .iter()
                    .map(|c| (c.lat, c.lng))
                    .collect::<Vec<_>>(),
                pool_cap - accepted.len(),
            );
            if selection.rejected > 0 {
                #[allow(clippy::cast_possible_truncation)]
                {
                    *rejection_reasons.entry("min_separation".to_owned()).or_insert(0) +=
                        selection.rejected as u64;
                }
                stats.total_rejected += selection.rejected;
            }
            accepted.extend(selection.accepted);

            batch_size = grow_batch(batch_size, self.config.batch_growth_percent);
        }

        stats.total_accepted = accepted.len();
        #[allow(clippy::cast_precision_loss)]
        if stats.total_evaluated > 0 {
            stats.acceptance_rate = stats.total_accepted as f64 / stats.total_evaluated as f64;
        }

        // The pool's deterministic rank order; the reranker and the
        // fallback both index into this.
        accepted.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.cell_id.cmp(&b.cell_id))
        });

        let ai_active = params.toggles.enable_ai_rationale && self.reranker.is_some();
        let (picks, selected_by_ai, rerank_stats) = self
            .final_selection(&accepted, target, params, ai_active, deadline)
            .await;

        let mut settlement_picks = 0usize;
        let suggestions: Vec<Suggestion> = picks
            .iter()
            .map(|pick| {
                let candidate = &accepted[pick.index];
                if candidate.origin == CandidateOrigin::Settlement {
                    settlement_picks += 1;
                }
                Suggestion {
                    id: Uuid::from_u64_pair(params.seed, candidate.cell_id),
                    lat: candidate.lat,
                    lng: candidate.lng,
                    score: candidate.score,
                    confidence: candidate.confidence,
                    band: candidate.band,
                    rationale: pick.rationale.clone(),
                    selected_by_ai,
                    status: SuggestionStatus::Pending,
                    scenario_id: None,
                    diagnostics: params
                        .toggles
                        .enable_diagnostics
                        .then(|| candidate.features.clone()),
                }
            })
            .collect();

        let elapsed = started.elapsed();
        #[allow(clippy::cast_precision_loss)]
        let avg_confidence = if suggestions.is_empty() {
            0.0
        } else {
            suggestions.iter().map(|s| s.confidence).sum::<f64>() / suggestions.len() as f64
        };
        #[allow(clippy::cast_precision_loss)]
        let settlement_actual_ratio = if suggestions.is_empty() {
            0.0
        } else {
            settlement_picks as f64 / suggestions.len() as f64
        };

        let performance_metrics = params.toggles.enable_diagnostics.then(|| {
            #[allow(clippy::cast_precision_loss)]
            let candidates_per_second = if elapsed.as_secs_f64() > 0.0 {
                stats.total_evaluated as f64 / elapsed.as_secs_f64()
            } else {
                0.0
            };
            PerformanceMetrics {
                candidates_per_second,
                openai_api_calls: rerank_stats.api_calls,
                openai_tokens_used: rerank_stats.tokens_used,
                openai_errors: rerank_stats.errors,
                openai_response_time_ms: rerank_stats.response_time_ms,
            }
        });

        info!(
            suggestions = suggestions.len(),
            evaluated = stats.total_evaluated,
            accepted = stats.total_accepted,
            selected_by_ai,
            elapsed_ms = elapsed.as_millis() as u64,
            "generation finished"
        );

        #[allow(clippy::cast_possible_truncation)]
        let generation_time_ms = elapsed.as_millis() as u64;
        let grid_picks = suggestions.len() - settlement_picks;
        Ok(GenerationResult {
            suggestions,
            metadata: GenerationMetadata {
                total_cells_scored: scored_cells,
                avg_confidence,
                generation_time_ms,
                seed: params.seed,
                expansion_stats: stats,
                rejection_reasons,
                features_enabled: FeaturesEnabled {
                    mapbox_filtering: urban_active,
                    ai_rationale: ai_active,
                },
                mixing_stats: MixingStats {
                    settlement_target_ratio: self.config.settlement_ratio,
                    settlement_actual_ratio,
                    settlement_candidates: settlement_picks,
                    grid_candidates: grid_picks,
                },
                performance_metrics,
                note: None,
            },
        })
    }

    /// Re-runs a saved scenario's parameters against a fresh store
    /// snapshot, producing a new scenario revision under the same identity.
    ///
    /// # Errors
    ///
    /// Same contract as [`ExpansionEngine::generate`].
    pub async fn refresh(
        &self,
        scenario: &Scenario,
        stores: &[Store],
    ) -> Result<Scenario, EngineError> {
        let result = self.generate(&scenario.params, stores).await?;
        let suggestions = result
            .suggestions
            .into_iter()
            .map(|mut s| {
                s.scenario_id = Some(scenario.id);
                s
            })
            .collect();
        Ok(Scenario {
            id: scenario.id,
            name: scenario.name.clone(),
            params: scenario.params.clone(),
            suggestions,
            data_version: Utc::now(),
        })
    }

    fn resolve_region(&self, filter: &RegionFilter) -> Option<BoundingBox> {
        match filter {
            RegionFilter::Named(name) => self.regions.resolve(name),
            RegionFilter::BoundingBox {
                north,
                south,
                east,
                west,
            } => Some(BoundingBox {
                north: *north,
                south: *south,
                east: *east,
                west: *west,
            }),
        }
    }

    /// Rejects candidates whose urban signals fail the hard filters.
    /// Unknown signals pass; only a positively failing signal rejects.
    fn urban_rejection(&self, features: &sitescout_core::RawFeatures) -> Option<&'static str> {
        let urban = features.urban.as_ref()?;
        if urban
            .road_distance_m
            .is_some_and(|d| d > self.config.max_road_distance_m)
        {
            return Some("road_distance");
        }
        if urban
            .building_distance_m
            .is_some_and(|d| d > self.config.max_building_distance_m)
        {
            return Some("building_distance");
        }
        let denied: Vec<&str> = self.config.denied_landuse.iter().map(String::as_str).collect();
        if urban.landuse_check(&denied) == LanduseCheck::Fail {
            return Some("landuse");
        }
        None
    }

    /// Picks the final `target` suggestions from the ranked pool, through
    /// the reranker when it is active and the deadline allows, otherwise
    /// deterministically.
    async fn final_selection(
        &self,
        pool: &[Candidate],
        target: usize,
        params: &GenerationParams,
        ai_active: bool,
        deadline: Instant,
    ) -> (Vec<RankedPick>, bool, RerankStats) {
        if ai_active {
            if let Some(reranker) = &self.reranker {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    warn!("deadline spent before reranking, using deterministic order");
                } else {
                    match tokio::time::timeout(
                        remaining,
                        reranker.rerank(pool, target, params.aggression),
                    )
                    .await
                    {
                        Ok(outcome) => {
                            return (outcome.picks, outcome.selected_by_ai, outcome.stats);
                        }
                        Err(_) => {
                            warn!("reranking exceeded the generation deadline, using fallback");
                        }
                    }
                }
            }
        }
        let picks = (0..target.min(pool.len()))
            .map(|index| RankedPick {
                index,
                rationale: None,
            })
            .collect();
        (picks, false, RerankStats::default())
    }
}

fn grow_batch(current: usize, growth_percent: u32) -> usize {
    let grown = current
        .saturating_mul(100 + growth_percent as usize)
        .saturating_div(100);
    grown.max(current + 1)
}

/// A well-formed empty result for regions the engine cannot expand into.
fn empty_result(settlement_ratio: f64, seed: u64, started: Instant) -> GenerationResult {
    #[allow(clippy::cast_possible_truncation)]
    let generation_time_ms = started.elapsed().as_millis() as u64;
    GenerationResult {
        suggestions: Vec::new(),
        metadata: GenerationMetadata {
            total_cells_scored: 0,
            avg_confidence: 0.0,
            generation_time_ms,
            seed,
            expansion_stats: ExpansionStats::default(),
            rejection_reasons: BTreeMap::new(),
            features_enabled: FeaturesEnabled::default(),
            mixing_stats: MixingStats {
                settlement_target_ratio: settlement_ratio,
                ..MixingStats::default()
            },
            performance_metrics: None,
            note: Some(NOTE_NO_REGION_DATA.to_owned()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_growth_is_geometric_and_strictly_increasing() {
        assert_eq!(grow_batch(100, 50), 150);
        assert_eq!(grow_batch(150, 50), 225);
        // Zero growth still makes progress.
        assert_eq!(grow_batch(10, 0), 11);
    }

    #[test]
    fn empty_result_carries_the_no_data_note() {
        let result = empty_result(0.3, 7, Instant::now());
        assert!(result.suggestions.is_empty());
        assert_eq!(result.metadata.note.as_deref(), Some(NOTE_NO_REGION_DATA));
        assert_eq!(result.metadata.seed, 7);
    }
}
