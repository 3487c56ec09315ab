//! Deterministic expansion-site generation.
//!
//! Pipeline: an adaptive grid proposes candidate points, the feature
//! extractor attaches raw market signals, the scorer folds them into a
//! score/confidence pair, spatial suppression enforces minimum separation,
//! and the strategy reranker (when enabled) makes the final pick. The same
//! parameters against the same store snapshot always produce byte-identical
//! output.

pub mod error;
pub mod features;
pub mod geo;
pub mod grid;
pub mod nms;
pub mod orchestrator;
pub mod providers;
pub mod score;

pub use error::{EngineError, ProviderError};
pub use orchestrator::ExpansionEngine;
