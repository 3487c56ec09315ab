use thiserror::Error;

/// Errors from the LLM strategy layer. None of them abort a generation
/// run; the reranker falls back to the deterministic ranking instead.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("chat API failure: {0}")]
    ApiFailure(#[from] reqwest::Error),

    #[error("chat API rate limited")]
    RateLimited,

    #[error("unusable reranker response: {0}")]
    InvalidResponse(String),

    #[error("failed to parse {context}: {source}")]
    Parsing {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}
