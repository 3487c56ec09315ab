//! Output types: suggestions, generation metadata, scenarios, store records.
//!
//! These are the caller-facing wire shapes; field names serialize in
//! camelCase to match the admin surface that consumes them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::candidate::{ConfidenceBand, RawFeatures};
use crate::params::GenerationParams;

/// Lifecycle status of an emitted suggestion. Transitions are triggered by
/// human review outside the engine; the engine always emits `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SuggestionStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Reviewed,
}

/// The persisted/output form of a surviving candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub id: Uuid,
    pub lat: f64,
    pub lng: f64,
    pub score: f64,
    pub confidence: f64,
    pub band: ConfidenceBand,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    pub selected_by_ai: bool,
    pub status: SuggestionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario_id: Option<Uuid>,
    /// Per-feature raw values, present when diagnostics are enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<RawFeatures>,
}

/// Read-only existing-store record from the snapshot provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turnover: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population_band: Option<u8>,
}

/// A named, persisted snapshot of parameters plus resulting suggestions.
/// The engine reads it when refreshing and produces it when generating for
/// save; it never mutates a scenario in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub id: Uuid,
    pub name: String,
    pub params: GenerationParams,
    pub suggestions: Vec<Suggestion>,
    pub data_version: DateTime<Utc>,
}

/// Counters for the orchestrator's iterative-expansion loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExpansionStats {
    pub iterations: u32,
    pub total_evaluated: usize,
    pub total_accepted: usize,
    pub total_rejected: usize,
    pub acceptance_rate: f64,
    pub timeout_reached: bool,
    pub max_candidates_reached: bool,
}

/// Which optional features were actually in effect for the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FeaturesEnabled {
    pub mapbox_filtering: bool,
    pub ai_rationale: bool,
}

/// Settlement vs. grid candidate mixing, target and achieved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MixingStats {
    pub settlement_target_ratio: f64,
    pub settlement_actual_ratio: f64,
    pub settlement_candidates: usize,
    pub grid_candidates: usize,
}

/// External-call accounting, present when diagnostics are enabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub candidates_per_second: f64,
    pub openai_api_calls: u32,
    pub openai_tokens_used: u64,
    pub openai_errors: u32,
    pub openai_response_time_ms: u64,
}

/// Everything a caller needs to explain degraded quality: counts, flags,
/// and the rejection-reason histogram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationMetadata {
    pub total_cells_scored: usize,
    pub avg_confidence: f64,
    pub generation_time_ms: u64,
    pub seed: u64,
    pub expansion_stats: ExpansionStats,
    /// Per-reason rejection counts. A `BTreeMap` so serialization order is
    /// deterministic.
    pub rejection_reasons: BTreeMap<String, u64>,
    pub features_enabled: FeaturesEnabled,
    pub mixing_stats: MixingStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performance_metrics: Option<PerformanceMetrics>,
    /// Explanatory note for empty or degraded results (e.g. `NO_REGION_DATA`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// The caller-facing result of one generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub suggestions: Vec<Suggestion>,
    pub metadata: GenerationMetadata,
}
