//! Retry classification and back-off schedule for the chat client.
//!
//! The delay schedule is fixed (base × 2ⁿ, no jitter) so a run with a
//! failing API produces the same timing and the same attempt count every
//! time. Non-transient errors stop the retry loop immediately.

use std::time::Duration;

use crate::error::StrategyError;

const MAX_DELAY_MS: u64 = 60_000;

/// Returns `true` for errors worth another attempt after a back-off delay.
///
/// **Retriable:** rate limiting, network-level failures (timeout, connect),
/// HTTP 5xx.
///
/// **Not retriable:** 4xx application errors, malformed or out-of-contract
/// responses. Retrying cannot fix those.
pub(crate) fn is_retriable(err: &StrategyError) -> bool {
    match err {
        StrategyError::RateLimited => true,
        StrategyError::ApiFailure(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        StrategyError::InvalidResponse(_) | StrategyError::Parsing { .. } => false,
    }
}

/// Delay before retry number `attempt` (1-based): base × 2^(attempt-1),
/// capped at 60 s.
pub(crate) fn backoff_delay(attempt: u32, base_ms: u64) -> Duration {
    let exponent = attempt.saturating_sub(1).min(10);
    let computed = base_ms.saturating_mul(1u64 << exponent);
    Duration::from_millis(computed.min(MAX_DELAY_MS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_is_retriable() {
        assert!(is_retriable(&StrategyError::RateLimited));
    }

    #[test]
    fn invalid_response_is_not_retriable() {
        assert!(!is_retriable(&StrategyError::InvalidResponse(
            "empty".to_owned()
        )));
    }

    #[test]
    fn parsing_error_is_not_retriable() {
        let source = serde_json::from_str::<()>("nope").unwrap_err();
        assert!(!is_retriable(&StrategyError::Parsing {
            context: "test".to_owned(),
            source,
        }));
    }

    #[test]
    fn delays_double_per_attempt() {
        assert_eq!(backoff_delay(1, 2_000), Duration::from_millis(2_000));
        assert_eq!(backoff_delay(2, 2_000), Duration::from_millis(4_000));
        assert_eq!(backoff_delay(3, 2_000), Duration::from_millis(8_000));
    }

    #[test]
    fn delay_is_capped_at_one_minute() {
        assert_eq!(backoff_delay(30, 2_000), Duration::from_millis(60_000));
    }
}
