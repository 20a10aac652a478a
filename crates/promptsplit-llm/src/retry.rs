//! Retry coordinator with jittered exponential backoff.
//!
//! Wraps any [`LlmBackend`] and re-issues failed invocations according to a
//! [`RetryPolicy`]. Retryability is decided purely by
//! [`ErrorKind`](crate::ErrorKind); auth, invalid-request, and quota failures
//! stop the loop on the first attempt.

use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{ErrorKind, LlmError};
use crate::types::{ChatRequest, LlmBackend, LlmResult};

/// Delays never drop below this floor, even after negative jitter.
const MIN_DELAY: Duration = Duration::from_millis(100);

/// Backoff and retryability policy for one logical call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first (must be >= 1)
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_base: f64,
    /// Uniform jitter as a fraction of the computed delay, in `[0, 1]`
    pub jitter_fraction: f64,
    pub non_retryable_kinds: HashSet<ErrorKind>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_base: 2.0,
            jitter_fraction: 0.25,
            non_retryable_kinds: HashSet::from([
                ErrorKind::Auth,
                ErrorKind::InvalidRequest,
                ErrorKind::QuotaExceeded,
            ]),
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry that follows failed attempt `attempt` (0-based).
    ///
    /// Exponential growth clamped at `max_delay`, then uniform jitter in
    /// `[-jitter_fraction, +jitter_fraction] * delay`, floored at 100ms.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        // A non-positive backoff base makes the exponential term negative on
        // odd attempts; such a delay floors at MIN_DELAY instead of panicking
        // in Duration::from_secs_f64.
        let exp = self.base_delay.as_secs_f64() * self.backoff_base.powi(attempt as i32);
        let clamped = exp.min(self.max_delay.as_secs_f64()).max(0.0);

        let jitter_span = self.jitter_fraction * clamped;
        let jitter = if jitter_span > 0.0 {
            rand::thread_rng().gen_range(-jitter_span..=jitter_span)
        } else {
            0.0
        };

        Duration::from_secs_f64((clamped + jitter).max(0.0)).max(MIN_DELAY)
    }

    /// Build a policy from the loaded retry table.
    ///
    /// Unrecognized kind names in `non_retryable_kinds` are logged and
    /// skipped rather than failing the whole load.
    #[must_use]
    pub fn from_config(config: &promptsplit_config::RetryConfig) -> Self {
        let mut non_retryable_kinds = HashSet::new();
        for name in &config.non_retryable_kinds {
            match name.parse::<ErrorKind>() {
                Ok(kind) => {
                    non_retryable_kinds.insert(kind);
                }
                Err(_) => warn!(name, "unknown error kind in non_retryable_kinds, ignoring"),
            }
        }

        Self {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_secs_f64(config.base_delay.max(0.0)),
            max_delay: Duration::from_secs_f64(config.max_delay.max(0.0)),
            backoff_base: config.backoff_base,
            jitter_fraction: config.jitter_fraction.clamp(0.0, 1.0),
            non_retryable_kinds,
        }
    }

    #[must_use]
    pub fn is_retryable(&self, kind: ErrorKind) -> bool {
        !self.non_retryable_kinds.contains(&kind)
    }
}

/// Per-call observability counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct RetryStats {
    pub attempts: u32,
    pub network_errors: u32,
    pub api_errors: u32,
    pub parse_errors: u32,
    pub rate_limit_errors: u32,
    pub server_errors: u32,
    pub success: bool,
}

impl RetryStats {
    fn record_failure(&mut self, kind: ErrorKind) {
        match kind {
            ErrorKind::Network => self.network_errors += 1,
            ErrorKind::RateLimit => self.rate_limit_errors += 1,
            ErrorKind::ServerError => self.server_errors += 1,
            ErrorKind::Parse | ErrorKind::Encoding => self.parse_errors += 1,
            ErrorKind::Auth
            | ErrorKind::InvalidRequest
            | ErrorKind::QuotaExceeded
            | ErrorKind::Unknown => self.api_errors += 1,
        }
    }
}

/// Backend wrapper that retries according to a [`RetryPolicy`].
#[derive(Clone)]
pub struct Retrier {
    backend: Arc<dyn LlmBackend>,
    policy: RetryPolicy,
}

impl Retrier {
    pub fn new(backend: Arc<dyn LlmBackend>, policy: RetryPolicy) -> Self {
        Self { backend, policy }
    }

    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Invoke the backend, retrying retryable failures.
    ///
    /// # Errors
    ///
    /// Returns the last failure once attempts are exhausted, or the first
    /// failure whose kind is non-retryable.
    pub async fn call(&self, request: ChatRequest) -> Result<LlmResult, LlmError> {
        self.call_with_stats(request).await.0
    }

    /// Like [`call`](Self::call), additionally returning the attempt counters.
    pub async fn call_with_stats(
        &self,
        request: ChatRequest,
    ) -> (Result<LlmResult, LlmError>, RetryStats) {
        let mut stats = RetryStats::default();
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 0..max_attempts {
            stats.attempts = attempt + 1;

            match self.backend.invoke(request.clone()).await {
                Ok(result) => {
                    stats.success = true;
                    debug!(attempts = stats.attempts, "call succeeded");
                    return (Ok(result), stats);
                }
                Err(err) => {
                    let kind = err.kind();
                    stats.record_failure(kind);

                    if !self.policy.is_retryable(kind) {
                        warn!(kind = %kind, "non-retryable failure, giving up");
                        return (Err(err), stats);
                    }

                    if attempt + 1 >= max_attempts {
                        warn!(
                            kind = %kind,
                            attempts = stats.attempts,
                            "attempts exhausted"
                        );
                        return (Err(err), stats);
                    }

                    let delay = self.policy.delay_for_attempt(attempt);
                    warn!(
                        kind = %kind,
                        attempt = stats.attempts,
                        delay_ms = delay.as_millis() as u64,
                        "retrying after failure"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }

        // max_attempts >= 1 guarantees the loop returned
        unreachable!("retry loop must return before exhausting its range")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use crate::types::Message;

    /// Backend that replays a scripted queue of outcomes.
    struct ScriptedBackend {
        outcomes: Mutex<Vec<Result<LlmResult, LlmError>>>,
    }

    impl ScriptedBackend {
        fn new(outcomes: Vec<Result<LlmResult, LlmError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes),
            }
        }
    }

    #[async_trait]
    impl LlmBackend for ScriptedBackend {
        async fn invoke(&self, _request: ChatRequest) -> Result<LlmResult, LlmError> {
            let mut outcomes = self.outcomes.lock().unwrap();
            assert!(!outcomes.is_empty(), "backend invoked more than scripted");
            outcomes.remove(0)
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_base: 2.0,
            jitter_fraction: 0.0,
            ..RetryPolicy::default()
        }
    }

    fn server_error() -> LlmError {
        LlmError::Server {
            status: 503,
            message: "unavailable".to_string(),
        }
    }

    fn ok_result() -> LlmResult {
        LlmResult::new("ok", "test-model")
    }

    fn request() -> ChatRequest {
        ChatRequest::new(vec![Message::user("hi")])
    }

    #[test]
    fn default_policy_matches_documented_values() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_attempts, 3);
        assert_eq!(p.base_delay, Duration::from_secs(1));
        assert_eq!(p.max_delay, Duration::from_secs(30));
        assert!((p.backoff_base - 2.0).abs() < f64::EPSILON);
        assert!((p.jitter_fraction - 0.25).abs() < f64::EPSILON);
        for kind in [
            ErrorKind::Auth,
            ErrorKind::InvalidRequest,
            ErrorKind::QuotaExceeded,
        ] {
            assert!(!p.is_retryable(kind), "{kind} should be non-retryable");
        }
        for kind in [
            ErrorKind::Network,
            ErrorKind::RateLimit,
            ErrorKind::ServerError,
            ErrorKind::Parse,
            ErrorKind::Unknown,
        ] {
            assert!(p.is_retryable(kind), "{kind} should be retryable");
        }
    }

    #[test]
    fn policy_from_config_parses_kind_names() {
        let cfg = promptsplit_config::RetryConfig::default();
        let p = RetryPolicy::from_config(&cfg);
        assert!(!p.is_retryable(ErrorKind::Auth));
        assert!(!p.is_retryable(ErrorKind::InvalidRequest));
        assert!(!p.is_retryable(ErrorKind::QuotaExceeded));
        assert!(p.is_retryable(ErrorKind::ServerError));
        assert_eq!(p.max_attempts, 3);
        assert_eq!(p.base_delay, Duration::from_secs(1));
    }

    #[test]
    fn policy_from_config_ignores_unknown_kind_names() {
        let cfg = promptsplit_config::RetryConfig {
            non_retryable_kinds: vec!["auth".to_string(), "bogus".to_string()],
            ..promptsplit_config::RetryConfig::default()
        };
        let p = RetryPolicy::from_config(&cfg);
        assert_eq!(p.non_retryable_kinds.len(), 1);
        assert!(!p.is_retryable(ErrorKind::Auth));
    }

    #[test]
    fn delay_grows_exponentially_and_clamps() {
        let p = RetryPolicy {
            jitter_fraction: 0.0,
            ..RetryPolicy::default()
        };
        assert_eq!(p.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(p.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(p.delay_for_attempt(2), Duration::from_secs(4));
        // 2^10 = 1024s clamps at max_delay
        assert_eq!(p.delay_for_attempt(10), Duration::from_secs(30));
    }

    #[test]
    fn jittered_delay_stays_within_band_and_above_floor() {
        let p = RetryPolicy::default();
        for _ in 0..200 {
            let d = p.delay_for_attempt(1).as_secs_f64();
            // 2s ± 25%
            assert!((1.5..=2.5).contains(&d), "delay {d} outside jitter band");
        }

        let tiny = RetryPolicy {
            base_delay: Duration::from_millis(1),
            jitter_fraction: 0.25,
            ..RetryPolicy::default()
        };
        for _ in 0..50 {
            assert!(tiny.delay_for_attempt(0) >= MIN_DELAY);
        }
    }

    #[test]
    fn non_positive_backoff_base_floors_instead_of_panicking() {
        let negative = RetryPolicy {
            backoff_base: -2.0,
            jitter_fraction: 0.0,
            ..RetryPolicy::default()
        };
        // Odd attempts make the exponential term negative.
        assert_eq!(negative.delay_for_attempt(1), MIN_DELAY);
        assert_eq!(negative.delay_for_attempt(2), Duration::from_secs(4));

        let jittered = RetryPolicy {
            backoff_base: -2.0,
            jitter_fraction: 0.25,
            ..RetryPolicy::default()
        };
        for attempt in 0..4 {
            assert!(jittered.delay_for_attempt(attempt) >= MIN_DELAY);
        }

        let zero = RetryPolicy {
            backoff_base: 0.0,
            jitter_fraction: 0.25,
            ..RetryPolicy::default()
        };
        assert_eq!(zero.delay_for_attempt(1), MIN_DELAY);
    }

    #[tokio::test]
    async fn three_server_errors_then_success_uses_four_attempts() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Err(server_error()),
            Err(server_error()),
            Err(server_error()),
            Ok(ok_result()),
        ]));
        let retrier = Retrier::new(backend, fast_policy(4));

        let (result, stats) = retrier.call_with_stats(request()).await;
        assert!(result.is_ok());
        assert_eq!(stats.attempts, 4);
        assert_eq!(stats.server_errors, 3);
        assert!(stats.success);
    }

    #[tokio::test]
    async fn auth_failure_stops_after_one_attempt() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Err(LlmError::Auth("rejected".to_string())),
            Ok(ok_result()),
        ]));
        let retrier = Retrier::new(backend, fast_policy(4));

        let (result, stats) = retrier.call_with_stats(request()).await;
        assert!(matches!(result, Err(LlmError::Auth(_))));
        assert_eq!(stats.attempts, 1);
        assert_eq!(stats.api_errors, 1);
        assert!(!stats.success);
    }

    #[tokio::test]
    async fn exhausted_attempts_return_last_error() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Err(LlmError::Network("refused".to_string())),
            Err(LlmError::RateLimit("slow down".to_string())),
            Err(server_error()),
        ]));
        let retrier = Retrier::new(backend, fast_policy(3));

        let (result, stats) = retrier.call_with_stats(request()).await;
        assert!(matches!(result, Err(LlmError::Server { .. })));
        assert_eq!(stats.attempts, 3);
        assert_eq!(stats.network_errors, 1);
        assert_eq!(stats.rate_limit_errors, 1);
        assert_eq!(stats.server_errors, 1);
    }

    #[tokio::test]
    async fn parse_failures_count_as_parse_errors_and_retry() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Err(LlmError::Parse("bad json".to_string())),
            Err(LlmError::Encoding("bad bytes".to_string())),
            Ok(ok_result()),
        ]));
        let retrier = Retrier::new(backend, fast_policy(3));

        let (result, stats) = retrier.call_with_stats(request()).await;
        assert!(result.is_ok());
        assert_eq!(stats.parse_errors, 2);
        assert_eq!(stats.attempts, 3);
    }

    #[tokio::test]
    async fn immediate_success_makes_one_attempt() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok(ok_result())]));
        let retrier = Retrier::new(backend, fast_policy(4));

        let (result, stats) = retrier.call_with_stats(request()).await;
        assert!(result.is_ok());
        assert_eq!(stats.attempts, 1);
        assert_eq!(stats, RetryStats {
            attempts: 1,
            success: true,
            ..RetryStats::default()
        });
    }
}
