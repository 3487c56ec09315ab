//! LLM-backed strategic reranking over a deterministic candidate pool.
//!
//! The engine hands this crate a best-first pool and a target count; it
//! returns the final pick order, either model-selected (with rationales
//! and guardrail vetting) or the deterministic fallback. All failure
//! modes degrade, none propagate.

pub mod client;
pub mod error;
pub mod guardrails;
pub mod prompt;
pub mod reranker;

mod retry;

pub use client::{ChatOutcome, LlmClient};
pub use error::StrategyError;
pub use guardrails::GuardrailDecision;
pub use reranker::{RankedPick, RerankOutcome, RerankStats, StrategyReranker};
