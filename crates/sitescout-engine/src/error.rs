use thiserror::Error;

use sitescout_core::{ConfigError, ParamsError};

/// Hard failures of the expansion engine.
///
/// Only parameter validation and configuration problems surface as errors;
/// every other condition (unresolvable region, provider outages, limits)
/// is recovered internally and reflected in the result metadata.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid generation parameters: {0}")]
    InvalidParameters(#[from] ParamsError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors from pluggable external data providers. These degrade the
/// pipeline (signal omitted, confidence penalty) and never abort it.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider response parse error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("provider call timed out after {0} ms")]
    Timeout(u64),
}
