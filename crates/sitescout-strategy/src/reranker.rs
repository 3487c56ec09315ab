//! The strategy reranker: one LLM pass over the deterministic pool, with
//! retries, guardrails, and a guaranteed fallback.
//!
//! The call sequence is an explicit state machine so every exit path is
//! enumerable: success, guardrail denial, retry exhaustion, and
//! non-retriable failure all end in a usable outcome. The fallback is the
//! deterministic top of the pool, so a dead or misbehaving API can degrade
//! quality but never the run.

use std::time::Instant;

use sitescout_core::Candidate;

use crate::client::LlmClient;
use crate::guardrails::{self, GuardrailDecision};
use crate::prompt::{self, ParsedSelection};
use crate::retry::{backoff_delay, is_retriable};

/// One pick in the final order, index into the pool handed to `rerank`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedPick {
    pub index: usize,
    pub rationale: Option<String>,
}

/// External-call accounting for the run metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RerankStats {
    pub api_calls: u32,
    pub tokens_used: u64,
    pub errors: u32,
    pub response_time_ms: u64,
}

#[derive(Debug, Clone)]
pub struct RerankOutcome {
    pub picks: Vec<RankedPick>,
    pub selected_by_ai: bool,
    pub stats: RerankStats,
    pub guardrail_flags: Vec<String>,
}

enum RerankState {
    Attempting { attempt: u32 },
    Accepted { selections: Vec<ParsedSelection> },
    FallingBack { reason: String },
}

pub struct StrategyReranker {
    client: LlmClient,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl StrategyReranker {
    #[must_use]
    pub fn new(client: LlmClient, max_retries: u32, backoff_base_ms: u64) -> Self {
        StrategyReranker {
            client,
            max_retries,
            backoff_base_ms,
        }
    }

    /// Reranks a pool that is already in deterministic best-first order,
    /// asking the model for `target` picks. Never fails: every path ends
    /// in either model selections or the deterministic fallback.
    pub async fn rerank(
        &self,
        pool: &[Candidate],
        target: usize,
        aggression: u32,
    ) -> RerankOutcome {
        let mut stats = RerankStats::default();
        let mut guardrail_flags = Vec::new();

        if pool.is_empty() || target == 0 {
            return RerankOutcome {
                picks: Vec::new(),
                selected_by_ai: false,
                stats,
                guardrail_flags,
            };
        }

        let user_prompt = prompt::build_rerank_prompt(pool, target.min(pool.len()), aggression);
        let mut state = RerankState::Attempting { attempt: 0 };

        loop {
            state = match state {
                RerankState::Attempting { attempt } => {
                    self.attempt(&user_prompt, pool, target, attempt, &mut stats)
                        .await
                }
                RerankState::Accepted { selections } => {
                    match guardrails::evaluate(&selections, pool, target) {
                        GuardrailDecision::Deny(reason) => {
                            tracing::warn!(%reason, "guardrails rejected model selections");
                            RerankState::FallingBack { reason }
                        }
                        decision => {
                            if let GuardrailDecision::Degrade(flags) = decision {
                                for flag in &flags {
                                    tracing::warn!(%flag, "guardrail flag on model selections");
                                }
                                guardrail_flags = flags;
                            }
                            let picks = selections
                                .into_iter()
                                .map(|s| RankedPick {
                                    index: s.index,
                                    rationale: Some(s.rationale),
                                })
                                .collect();
                            return RerankOutcome {
                                picks,
                                selected_by_ai: true,
                                stats,
                                guardrail_flags,
                            };
                        }
                    }
                }
                RerankState::FallingBack { reason } => {
                    tracing::info!(%reason, "falling back to deterministic ranking");
                    return RerankOutcome {
                        picks: fallback_picks(pool.len(), target),
                        selected_by_ai: false,
                        stats,
                        guardrail_flags,
                    };
                }
            };
        }
    }

    async fn attempt(
        &self,
        user_prompt: &str,
        pool: &[Candidate],
        target: usize,
        attempt: u32,
        stats: &mut RerankStats,
    ) -> RerankState {
        let started = Instant::now();
        stats.api_calls += 1;
        let result = self.client.chat(prompt::SYSTEM_PROMPT, user_prompt).await;
        #[allow(clippy::cast_possible_truncation)]
        {
            stats.response_time_ms += started.elapsed().as_millis() as u64;
        }

        let error = match result {
            Ok(outcome) => {
                stats.tokens_used += outcome.tokens_used;
                match prompt::parse_selections(&outcome.content, pool.len()) {
                    Ok(mut selections) => {
                        selections.truncate(target);
                        return RerankState::Accepted { selections };
                    }
                    Err(e) => e,
                }
            }
            Err(e) => e,
        };

        stats.errors += 1;
        if !is_retriable(&error) || attempt >= self.max_retries {
            return RerankState::FallingBack {
                reason: error.to_string(),
            };
        }
        let next_attempt = attempt + 1;
        let delay = backoff_delay(next_attempt, self.backoff_base_ms);
        tracing::warn!(
            attempt = next_attempt,
            max_retries = self.max_retries,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "rerank call failed, retrying after back-off"
        );
        tokio::time::sleep(delay).await;
        RerankState::Attempting {
            attempt: next_attempt,
        }
    }
}

/// Deterministic fallback: the first `target` pool entries in order.
fn fallback_picks(pool_len: usize, target: usize) -> Vec<RankedPick> {
    (0..target.min(pool_len))
        .map(|index| RankedPick {
            index,
            rationale: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_covers_the_whole_pool_when_short() {
        let picks = fallback_picks(3, 10);
        assert_eq!(picks.len(), 3);
        assert_eq!(picks[0].index, 0);
        assert_eq!(picks[2].index, 2);
        assert!(picks.iter().all(|p| p.rationale.is_none()));
    }

    #[test]
    fn fallback_respects_the_target() {
        let picks = fallback_picks(100, 5);
        assert_eq!(picks.len(), 5);
    }
}
