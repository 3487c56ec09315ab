//! Engine configuration from environment variables.
//!
//! Every tunable has a default, so the engine runs with an empty
//! environment; deployments override with `SITESCOUT_*` variables. The
//! parsing core is decoupled from the process environment so it can be
//! tested with a pure `HashMap` lookup.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid env var {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read catalog file {path}: {source}")]
    CatalogIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse catalog YAML: {0}")]
    CatalogParse(#[from] serde_yaml::Error),

    #[error("catalog validation failed: {0}")]
    Validation(String),
}

/// All engine tunables. Secrets are redacted in the `Debug` output.
#[derive(Clone)]
pub struct EngineConfig {
    /// Optional override for the embedded region catalog.
    pub regions_path: Option<PathBuf>,
    /// Optional override for the embedded settlement catalog.
    pub settlements_path: Option<PathBuf>,

    // Orchestrator loop.
    pub initial_batch: usize,
    pub batch_growth_percent: u32,
    pub max_candidates: usize,
    pub generation_timeout_ms: u64,

    // Scoring.
    pub saturation_threshold: usize,
    pub saturation_attenuation: f64,
    pub completeness_floor: f64,
    pub unknown_signal_penalty_cap: f64,
    pub max_population_anchor: u32,
    pub proximity_midpoint_m: f64,
    pub proximity_steepness_m: f64,
    pub reference_turnover: f64,
    pub peer_radius_m: f64,

    // Grid builder.
    pub settlement_ratio: f64,

    // Urban-suitability provider.
    pub urban_base_url: String,
    pub mapbox_token: Option<String>,
    pub urban_timeout_ms: u64,
    pub max_road_distance_m: f64,
    pub max_building_distance_m: f64,
    pub denied_landuse: Vec<String>,

    // LLM strategy layer.
    pub openai_base_url: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub llm_timeout_ms: u64,
    pub llm_max_retries: u32,
    pub llm_backoff_base_ms: u64,
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("regions_path", &self.regions_path)
            .field("settlements_path", &self.settlements_path)
            .field("initial_batch", &self.initial_batch)
            .field("batch_growth_percent", &self.batch_growth_percent)
            .field("max_candidates", &self.max_candidates)
            .field("generation_timeout_ms", &self.generation_timeout_ms)
            .field("saturation_threshold", &self.saturation_threshold)
            .field("saturation_attenuation", &self.saturation_attenuation)
            .field("completeness_floor", &self.completeness_floor)
            .field(
                "unknown_signal_penalty_cap",
                &self.unknown_signal_penalty_cap,
            )
            .field("max_population_anchor", &self.max_population_anchor)
            .field("proximity_midpoint_m", &self.proximity_midpoint_m)
            .field("proximity_steepness_m", &self.proximity_steepness_m)
            .field("reference_turnover", &self.reference_turnover)
            .field("peer_radius_m", &self.peer_radius_m)
            .field("settlement_ratio", &self.settlement_ratio)
            .field("urban_base_url", &self.urban_base_url)
            .field(
                "mapbox_token",
                &self.mapbox_token.as_ref().map(|_| "[redacted]"),
            )
            .field("urban_timeout_ms", &self.urban_timeout_ms)
            .field("max_road_distance_m", &self.max_road_distance_m)
            .field("max_building_distance_m", &self.max_building_distance_m)
            .field("denied_landuse", &self.denied_landuse)
            .field("openai_base_url", &self.openai_base_url)
            .field(
                "openai_api_key",
                &self.openai_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("openai_model", &self.openai_model)
            .field("llm_timeout_ms", &self.llm_timeout_ms)
            .field("llm_max_retries", &self.llm_max_retries)
            .field("llm_backoff_base_ms", &self.llm_backoff_base_ms)
            .finish()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        build_config(|_| Err(std::env::VarError::NotPresent))
            .expect("default configuration must be valid")
    }
}

impl EngineConfig {
    /// Load configuration from environment variables, reading `.env` first.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if any set variable fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_env_only()
    }

    /// Load configuration from the process environment without touching
    /// `.env` files — useful for tests and callers managing env setup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if any set variable fails to parse.
    pub fn from_env_only() -> Result<Self, ConfigError> {
        build_config(|key| std::env::var(key))
    }
}

/// Build the configuration using the provided env-var lookup function.
fn build_config<F>(lookup: F) -> Result<EngineConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default =
        |var: &str, default: &str| -> String { lookup(var).unwrap_or_else(|_| default.to_owned()) };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_owned(),
                reason: e.to_string(),
            })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_owned(),
                reason: e.to_string(),
            })
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_owned(),
                reason: e.to_string(),
            })
    };

    let parse_f64 = |var: &str, default: &str| -> Result<f64, ConfigError> {
        let raw = or_default(var, default);
        let value = raw
            .parse::<f64>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_owned(),
                reason: e.to_string(),
            })?;
        if !value.is_finite() {
            return Err(ConfigError::InvalidEnvVar {
                var: var.to_owned(),
                reason: "must be finite".to_owned(),
            });
        }
        Ok(value)
    };

    let parse_ratio = |var: &str, default: &str| -> Result<f64, ConfigError> {
        let value = parse_f64(var, default)?;
        if !(0.0..=1.0).contains(&value) {
            return Err(ConfigError::InvalidEnvVar {
                var: var.to_owned(),
                reason: format!("{value} outside [0, 1]"),
            });
        }
        Ok(value)
    };

    let denied_landuse = or_default("SITESCOUT_DENIED_LANDUSE", "industrial,military,landfill")
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();

    Ok(EngineConfig {
        regions_path: lookup("SITESCOUT_REGIONS_PATH").ok().map(PathBuf::from),
        settlements_path: lookup("SITESCOUT_SETTLEMENTS_PATH").ok().map(PathBuf::from),

        initial_batch: parse_usize("SITESCOUT_INITIAL_BATCH", "100")?,
        batch_growth_percent: parse_u32("SITESCOUT_BATCH_GROWTH_PERCENT", "50")?,
        max_candidates: parse_usize("SITESCOUT_MAX_CANDIDATES", "5000")?,
        generation_timeout_ms: parse_u64("SITESCOUT_GENERATION_TIMEOUT_MS", "20000")?,

        saturation_threshold: parse_usize("SITESCOUT_SATURATION_THRESHOLD", "3")?,
        saturation_attenuation: parse_ratio("SITESCOUT_SATURATION_ATTENUATION", "0.7")?,
        completeness_floor: parse_ratio("SITESCOUT_COMPLETENESS_FLOOR", "0.25")?,
        unknown_signal_penalty_cap: parse_ratio("SITESCOUT_UNKNOWN_SIGNAL_PENALTY_CAP", "0.20")?,
        max_population_anchor: parse_u32("SITESCOUT_MAX_POPULATION_ANCHOR", "2000000")?,
        proximity_midpoint_m: parse_f64("SITESCOUT_PROXIMITY_MIDPOINT_M", "3000")?,
        proximity_steepness_m: parse_f64("SITESCOUT_PROXIMITY_STEEPNESS_M", "1200")?,
        reference_turnover: parse_f64("SITESCOUT_REFERENCE_TURNOVER", "1000000")?,
        peer_radius_m: parse_f64("SITESCOUT_PEER_RADIUS_M", "10000")?,

        settlement_ratio: parse_ratio("SITESCOUT_SETTLEMENT_RATIO", "0.30")?,

        urban_base_url: or_default("SITESCOUT_URBAN_BASE_URL", "https://api.mapbox.com"),
        mapbox_token: lookup("MAPBOX_ACCESS_TOKEN").ok(),
        urban_timeout_ms: parse_u64("SITESCOUT_URBAN_TIMEOUT_MS", "3000")?,
        max_road_distance_m: parse_f64("SITESCOUT_MAX_ROAD_DISTANCE_M", "500")?,
        max_building_distance_m: parse_f64("SITESCOUT_MAX_BUILDING_DISTANCE_M", "300")?,
        denied_landuse,

        openai_base_url: or_default("SITESCOUT_OPENAI_BASE_URL", "https://api.openai.com"),
        openai_api_key: lookup("OPENAI_API_KEY").ok(),
        openai_model: or_default("SITESCOUT_OPENAI_MODEL", "gpt-4o-mini"),
        llm_timeout_ms: parse_u64("SITESCOUT_LLM_TIMEOUT_MS", "15000")?,
        llm_max_retries: parse_u32("SITESCOUT_LLM_MAX_RETRIES", "3")?,
        llm_backoff_base_ms: parse_u64("SITESCOUT_LLM_BACKOFF_BASE_MS", "2000")?,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::env::VarError;

    use super::*;

    fn lookup_from_map<'a>(
        map: &'a HashMap<&'a str, &'a str>,
    ) -> impl Fn(&str) -> Result<String, VarError> + 'a {
        move |key| {
            map.get(key)
                .map(|v| (*v).to_owned())
                .ok_or(VarError::NotPresent)
        }
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let map: HashMap<&str, &str> = HashMap::new();
        let cfg = build_config(lookup_from_map(&map)).unwrap();
        assert_eq!(cfg.initial_batch, 100);
        assert_eq!(cfg.batch_growth_percent, 50);
        assert_eq!(cfg.max_candidates, 5000);
        assert_eq!(cfg.generation_timeout_ms, 20_000);
        assert_eq!(cfg.saturation_threshold, 3);
        assert!((cfg.settlement_ratio - 0.30).abs() < 1e-12);
        assert!((cfg.completeness_floor - 0.25).abs() < 1e-12);
        assert!(cfg.mapbox_token.is_none());
        assert!(cfg.openai_api_key.is_none());
        assert_eq!(cfg.llm_max_retries, 3);
        assert_eq!(cfg.llm_backoff_base_ms, 2000);
        assert_eq!(
            cfg.denied_landuse,
            vec!["industrial", "military", "landfill"]
        );
    }

    #[test]
    fn default_trait_matches_empty_environment() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.initial_batch, 100);
        assert_eq!(cfg.openai_model, "gpt-4o-mini");
    }

    #[test]
    fn overrides_are_applied() {
        let mut map = HashMap::new();
        map.insert("SITESCOUT_INITIAL_BATCH", "25");
        map.insert("SITESCOUT_SETTLEMENT_RATIO", "0.5");
        map.insert("OPENAI_API_KEY", "sk-test");
        let cfg = build_config(lookup_from_map(&map)).unwrap();
        assert_eq!(cfg.initial_batch, 25);
        assert!((cfg.settlement_ratio - 0.5).abs() < 1e-12);
        assert_eq!(cfg.openai_api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn invalid_number_is_rejected() {
        let mut map = HashMap::new();
        map.insert("SITESCOUT_MAX_CANDIDATES", "not-a-number");
        let result = build_config(lookup_from_map(&map));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "SITESCOUT_MAX_CANDIDATES"
        ));
    }

    #[test]
    fn ratio_outside_unit_interval_is_rejected() {
        let mut map = HashMap::new();
        map.insert("SITESCOUT_SETTLEMENT_RATIO", "1.5");
        let result = build_config(lookup_from_map(&map));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "SITESCOUT_SETTLEMENT_RATIO"
        ));
    }

    #[test]
    fn denied_landuse_parses_comma_separated() {
        let mut map = HashMap::new();
        map.insert("SITESCOUT_DENIED_LANDUSE", "Industrial, Quarry ,");
        let cfg = build_config(lookup_from_map(&map)).unwrap();
        assert_eq!(cfg.denied_landuse, vec!["industrial", "quarry"]);
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let mut map = HashMap::new();
        map.insert("OPENAI_API_KEY", "sk-secret");
        map.insert("MAPBOX_ACCESS_TOKEN", "pk.secret");
        let cfg = build_config(lookup_from_map(&map)).unwrap();
        let debug = format!("{cfg:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(!debug.contains("pk.secret"));
        assert!(debug.contains("[redacted]"));
    }
}
