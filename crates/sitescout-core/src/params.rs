//! Generation parameters and their up-front validation.
//!
//! A [`GenerationParams`] value is the full deterministic input to one
//! generation run. Validation happens before any computation starts;
//! everything downstream may assume the parameters are well-formed.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Selection over geography: either a named country/state from the region
/// catalog, or an explicit bounding box in degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionFilter {
    /// A named region resolved through the region catalog (e.g. `"Germany"`).
    Named(String),
    /// An explicit bounding box. `north > south` and the east/west pair must
    /// describe a non-degenerate span.
    BoundingBox {
        north: f64,
        south: f64,
        east: f64,
        west: f64,
    },
}

/// Feature toggles for one generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct FeatureToggles {
    /// Pull urban-suitability signals (road/building/land-use) per candidate.
    #[serde(rename = "enableMapboxFiltering")]
    pub enable_urban_filtering: bool,
    /// Invoke the LLM strategy reranker on the final accepted pool.
    #[serde(rename = "enableAIRationale")]
    pub enable_ai_rationale: bool,
    /// Attach per-feature raw values to each emitted suggestion.
    pub enable_diagnostics: bool,
}

/// Malformed generation parameters. Surfaced immediately; no partial
/// computation is attempted.
#[derive(Debug, Error, PartialEq)]
pub enum ParamsError {
    #[error("aggression {0} outside 0..=100")]
    AggressionOutOfRange(u32),

    #[error("bias weight '{name}' is {value}, must be within [0, 1]")]
    BiasOutOfRange { name: &'static str, value: f64 },

    #[error("min_distance_m must be positive, got {0}")]
    NonPositiveMinDistance(f64),

    #[error("region filter names an empty region")]
    EmptyRegion,

    #[error("bounding box is degenerate: {0}")]
    DegenerateBoundingBox(String),

    #[error("coordinate out of range: {0}")]
    CoordinateOutOfRange(String),

    #[error("target_count must be positive when set")]
    ZeroTargetCount,
}

/// The full deterministic input to one generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParams {
    pub region: RegionFilter,
    /// User-facing density knob, 0–100. Maps monotonically to a target
    /// suggestion count unless `target_count` overrides it.
    pub aggression: u32,
    /// Bias weight for the population factor, in [0, 1].
    pub bias_population: f64,
    /// Bias weight for the proximity-gap factor, in [0, 1].
    pub bias_proximity: f64,
    /// Bias weight for the turnover factor, in [0, 1].
    pub bias_turnover: f64,
    /// Minimum separation between accepted suggestions, in meters.
    pub min_distance_m: f64,
    /// Seed for all pseudo-random decisions in the pipeline.
    pub seed: u64,
    /// Explicit target suggestion count; overrides the aggression mapping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_count: Option<usize>,
    #[serde(default, flatten)]
    pub toggles: FeatureToggles,
}

impl GenerationParams {
    /// Validates every field per the engine's input contract.
    ///
    /// # Errors
    ///
    /// Returns the first [`ParamsError`] found: aggression outside 0..=100,
    /// any bias outside [0, 1], a non-positive `min_distance_m`, a zero
    /// explicit target count, or an empty/degenerate region filter.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.aggression > 100 {
            return Err(ParamsError::AggressionOutOfRange(self.aggression));
        }
        for (name, value) in [
            ("population", self.bias_population),
            ("proximity", self.bias_proximity),
            ("turnover", self.bias_turnover),
        ] {
            if !(0.0..=1.0).contains(&value) || value.is_nan() {
                return Err(ParamsError::BiasOutOfRange { name, value });
            }
        }
        if !(self.min_distance_m > 0.0) {
            return Err(ParamsError::NonPositiveMinDistance(self.min_distance_m));
        }
        if self.target_count == Some(0) {
            return Err(ParamsError::ZeroTargetCount);
        }
        match &self.region {
            RegionFilter::Named(name) => {
                if name.trim().is_empty() {
                    return Err(ParamsError::EmptyRegion);
                }
            }
            RegionFilter::BoundingBox {
                north,
                south,
                east,
                west,
            } => {
                for (label, value, limit) in [
                    ("north", *north, 90.0),
                    ("south", *south, 90.0),
                    ("east", *east, 180.0),
                    ("west", *west, 180.0),
                ] {
                    if !value.is_finite() || value.abs() > limit {
                        return Err(ParamsError::CoordinateOutOfRange(format!(
                            "{label}={value}"
                        )));
                    }
                }
                if north <= south {
                    return Err(ParamsError::DegenerateBoundingBox(format!(
                        "north ({north}) must be greater than south ({south})"
                    )));
                }
                if (east - west).abs() < f64::EPSILON {
                    return Err(ParamsError::DegenerateBoundingBox(
                        "east/west span is zero".to_owned(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// The number of suggestions this run aims for.
    ///
    /// Uses the explicit `target_count` when set, otherwise the documented
    /// monotonic mapping `5 + round(aggression * 0.45)`: 5 suggestions at
    /// aggression 0, 50 at aggression 100.
    #[must_use]
    pub fn target(&self) -> usize {
        if let Some(count) = self.target_count {
            return count;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let mapped = 5 + (f64::from(self.aggression) * 0.45).round() as usize;
        mapped
    }

    /// Bias weights renormalized to sum to 1.
    ///
    /// The caller-provided weights need not sum to 1; an all-zero triple
    /// falls back to equal thirds rather than dividing by zero.
    #[must_use]
    pub fn normalized_biases(&self) -> (f64, f64, f64) {
        let sum = self.bias_population + self.bias_proximity + self.bias_turnover;
        if sum <= f64::EPSILON {
            return (1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0);
        }
        (
            self.bias_population / sum,
            self.bias_proximity / sum,
            self.bias_turnover / sum,
        )
    }
}
