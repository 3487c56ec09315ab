//! Prompt construction and response parsing for the strategy reranker.
//!
//! The model sees a compact numbered table of the deterministic pool and
//! must answer with a strict JSON object; anything else is rejected and
//! counted as an attempt failure. Markdown code fences around the JSON are
//! tolerated because several models wrap output in them regardless of
//! instructions.

use serde::Deserialize;

use sitescout_core::Candidate;

use crate::error::StrategyError;

pub(crate) const SYSTEM_PROMPT: &str = "You are a retail expansion strategist. You pick the \
strongest store locations from a pre-scored candidate list, balancing market coverage against \
cannibalization. Answer with JSON only, no prose.";

/// One selection the model proposed, index into the candidate pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSelection {
    pub index: usize,
    pub rationale: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RerankResponse {
    selections: Vec<SelectionEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SelectionEntry {
    candidate_index: usize,
    rationale: String,
}

/// Renders the user prompt for one rerank call over the pool.
///
/// The pool is expected in deterministic rank order (best first); the
/// prompt tells the model so, which anchors its output against drifting
/// too far from the scoring.
#[must_use]
pub fn build_rerank_prompt(pool: &[Candidate], target: usize, aggression: u32) -> String {
    let mut prompt = format!(
        "Select exactly {target} expansion sites from the {} candidates below \
         (aggression level {aggression}/100, higher means bolder picks).\n\
         Candidates are listed best-first by a deterministic market score.\n\n",
        pool.len()
    );
    for (index, candidate) in pool.iter().enumerate() {
        let population = candidate
            .features
            .population
            .map_or_else(|| "unknown".to_owned(), |p| p.to_string());
        let nearest = candidate
            .features
            .nearest_store_m
            .map_or_else(|| "none".to_owned(), |d| format!("{:.0} m", d));
        let anchors = candidate
            .features
            .anchor_count
            .map_or_else(|| "unknown".to_owned(), |a| a.to_string());
        prompt.push_str(&format!(
            "{index}: ({:.4}, {:.4}) score {:.3}, population {population}, \
             nearest store {nearest}, stores within 5km {}, anchors {anchors}\n",
            candidate.lat, candidate.lng, candidate.score, candidate.features.stores_within_5km
        ));
    }
    prompt.push_str(
        "\nRespond with JSON of the form \
         {\"selections\": [{\"candidateIndex\": 0, \"rationale\": \"...\"}]}.\n\
         Each rationale must cite concrete signals (population, anchors, market gap, \
         peer performance) in at least 50 characters.",
    );
    prompt
}

/// Parses a model reply into bounds-checked, deduplicated selections.
///
/// # Errors
///
/// [`StrategyError::Parsing`] when the body is not the expected JSON,
/// [`StrategyError::InvalidResponse`] when it is empty, repeats an index,
/// or points outside the pool.
pub fn parse_selections(
    raw: &str,
    pool_len: usize,
) -> Result<Vec<ParsedSelection>, StrategyError> {
    let body = strip_code_fence(raw);
    let response: RerankResponse =
        serde_json::from_str(body).map_err(|source| StrategyError::Parsing {
            context: "rerank selections".to_owned(),
            source,
        })?;

    if response.selections.is_empty() {
        return Err(StrategyError::InvalidResponse(
            "model selected nothing".to_owned(),
        ));
    }

    let mut seen = vec![false; pool_len];
    let mut selections = Vec::with_capacity(response.selections.len());
    for entry in response.selections {
        if entry.candidate_index >= pool_len {
            return Err(StrategyError::InvalidResponse(format!(
                "candidate index {} out of range (pool of {pool_len})",
                entry.candidate_index
            )));
        }
        if seen[entry.candidate_index] {
            return Err(StrategyError::InvalidResponse(format!(
                "candidate index {} selected twice",
                entry.candidate_index
            )));
        }
        seen[entry.candidate_index] = true;
        selections.push(ParsedSelection {
            index: entry.candidate_index,
            rationale: entry.rationale,
        });
    }
    Ok(selections)
}

/// Drops a surrounding ```…``` fence, with or without a language tag.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(rest) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Skip an optional language tag on the opening fence line.
    match rest.split_once('\n') {
        Some((first_line, body)) if !first_line.trim().starts_with('{') => body.trim(),
        _ => rest.trim(),
    }
}
