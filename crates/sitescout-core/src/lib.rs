//! Shared domain types for the sitescout expansion engine.
//!
//! Holds the generation parameters and their up-front validation, the
//! candidate/suggestion data model, the named-region and settlement
//! catalogs, and the environment-variable configuration layer. The engine
//! and strategy crates build on these types; nothing here performs I/O
//! beyond reading catalog files and environment variables.

pub mod candidate;
pub mod config;
pub mod params;
pub mod regions;
pub mod result;
pub mod settlements;

pub use candidate::{
    Candidate, CandidateOrigin, ConfidenceBand, LanduseCheck, RawFeatures, UrbanSignals,
};
pub use config::{ConfigError, EngineConfig};
pub use params::{FeatureToggles, GenerationParams, ParamsError, RegionFilter};
pub use regions::{BoundingBox, RegionCatalog, RegionEntry};
pub use result::{
    ExpansionStats, FeaturesEnabled, GenerationMetadata, GenerationResult, MixingStats,
    PerformanceMetrics, Scenario, Store, Suggestion, SuggestionStatus,
};
pub use settlements::{Settlement, SettlementCatalog};
