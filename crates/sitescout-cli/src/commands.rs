//! Command handlers for the sitescout CLI.
//!
//! Each handler builds an engine from the environment configuration, runs
//! one operation, and prints the result as pretty JSON on stdout so it can
//! be piped into files or other tools.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;

use sitescout_core::{
    EngineConfig, FeatureToggles, GenerationParams, RegionCatalog, RegionFilter, Scenario, Store,
};
use sitescout_engine::ExpansionEngine;

#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Named region from the catalog (e.g. "Germany"); mutually exclusive
    /// with --bbox
    #[arg(long, conflicts_with = "bbox")]
    region: Option<String>,
    /// Explicit bounding box as north,south,east,west in degrees
    #[arg(long, conflicts_with = "region")]
    bbox: Option<String>,
    /// Density knob, 0 (cautious) to 100 (aggressive)
    #[arg(long, default_value = "50")]
    aggression: u32,
    /// Bias weight for the population factor, in [0, 1]
    #[arg(long, default_value = "0.5")]
    bias_population: f64,
    /// Bias weight for the proximity-gap factor, in [0, 1]
    #[arg(long, default_value = "0.3")]
    bias_proximity: f64,
    /// Bias weight for the turnover factor, in [0, 1]
    #[arg(long, default_value = "0.2")]
    bias_turnover: f64,
    /// Minimum separation between suggestions, in meters
    #[arg(long, default_value = "1000")]
    min_distance: f64,
    /// Seed for all pseudo-random decisions; same seed, same output
    #[arg(long, default_value = "0")]
    seed: u64,
    /// Exact suggestion count, overriding the aggression mapping
    #[arg(long)]
    target: Option<usize>,
    /// JSON file with the existing-store snapshot
    #[arg(long)]
    stores: Option<PathBuf>,
    /// Filter candidates through the urban-suitability provider
    #[arg(long)]
    urban: bool,
    /// Rerank the final pool through the LLM strategist
    #[arg(long)]
    ai: bool,
    /// Attach raw feature values and performance metrics to the output
    #[arg(long)]
    diagnostics: bool,
}

#[derive(Debug, Args)]
pub struct RefreshArgs {
    /// JSON file holding the saved scenario
    #[arg(long)]
    scenario: PathBuf,
    /// JSON file with the fresh store snapshot
    #[arg(long)]
    stores: Option<PathBuf>,
}

pub(crate) async fn run_generate(args: GenerateArgs) -> anyhow::Result<()> {
    let region = match (&args.region, &args.bbox) {
        (Some(name), None) => RegionFilter::Named(name.clone()),
        (None, Some(bbox)) => parse_bbox(bbox)?,
        _ => anyhow::bail!("exactly one of --region or --bbox is required"),
    };

    let params = GenerationParams {
        region,
        aggression: args.aggression,
        bias_population: args.bias_population,
        bias_proximity: args.bias_proximity,
        bias_turnover: args.bias_turnover,
        min_distance_m: args.min_distance,
        seed: args.seed,
        target_count: args.target,
        toggles: FeatureToggles {
            enable_urban_filtering: args.urban,
            enable_ai_rationale: args.ai,
            enable_diagnostics: args.diagnostics,
        },
    };

    let stores = load_stores(args.stores.as_deref())?;
    let config = EngineConfig::from_env()?;
    let engine = ExpansionEngine::new(config)?;
    let result = engine.generate(&params, &stores).await?;

    tracing::info!(
        suggestions = result.suggestions.len(),
        avg_confidence = result.metadata.avg_confidence,
        "generation complete"
    );
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

pub(crate) async fn run_refresh(args: RefreshArgs) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(&args.scenario)
        .with_context(|| format!("reading scenario file {}", args.scenario.display()))?;
    let scenario: Scenario = serde_json::from_str(&content)
        .with_context(|| format!("parsing scenario file {}", args.scenario.display()))?;

    let stores = load_stores(args.stores.as_deref())?;
    let config = EngineConfig::from_env()?;
    let engine = ExpansionEngine::new(config)?;
    let refreshed = engine.refresh(&scenario, &stores).await?;

    println!("{}", serde_json::to_string_pretty(&refreshed)?);
    Ok(())
}

pub(crate) fn run_regions() -> anyhow::Result<()> {
    let config = EngineConfig::from_env()?;
    let catalog = match &config.regions_path {
        Some(path) => RegionCatalog::load(path)?,
        None => RegionCatalog::builtin(),
    };
    println!("{}", serde_json::to_string_pretty(catalog.entries())?);
    Ok(())
}

/// Parses `north,south,east,west` into a bounding-box region filter.
fn parse_bbox(raw: &str) -> anyhow::Result<RegionFilter> {
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    if parts.len() != 4 {
        anyhow::bail!("--bbox expects north,south,east,west, got '{raw}'");
    }
    let mut values = [0.0_f64; 4];
    for (value, part) in values.iter_mut().zip(&parts) {
        *value = part
            .parse()
            .with_context(|| format!("invalid coordinate '{part}' in --bbox"))?;
    }
    Ok(RegionFilter::BoundingBox {
        north: values[0],
        south: values[1],
        east: values[2],
        west: values[3],
    })
}

/// Loads the store snapshot, or an empty one when no file is given.
fn load_stores(path: Option<&Path>) -> anyhow::Result<Vec<Store>> {
    let Some(path) = path else {
        tracing::warn!("no store snapshot given, proceeding with an empty market");
        return Ok(Vec::new());
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading store snapshot {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("parsing store snapshot {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_parses_four_coordinates() {
        let filter = parse_bbox("52.7, 52.3, 13.7, 13.1").unwrap();
        assert_eq!(
            filter,
            RegionFilter::BoundingBox {
                north: 52.7,
                south: 52.3,
                east: 13.7,
                west: 13.1,
            }
        );
    }

    #[test]
    fn bbox_rejects_wrong_arity() {
        assert!(parse_bbox("52.7,52.3,13.7").is_err());
    }

    #[test]
    fn bbox_rejects_non_numeric_input() {
        assert!(parse_bbox("north,52.3,13.7,13.1").is_err());
    }

    #[test]
    fn missing_store_snapshot_defaults_to_empty() {
        assert!(load_stores(None).unwrap().is_empty());
    }
}
