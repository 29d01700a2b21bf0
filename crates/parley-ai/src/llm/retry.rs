//! Retry policy for LLM HTTP calls.
//!
//! `LlmRetryConfig::run` drives a request closure until it succeeds, fails
//! with a non-retryable error, or runs out of attempts. The backoff doubles
//! per attempt; a server `Retry-After` hint replaces it, capped at
//! `max_delay`.

use std::future::Future;
use std::time::Duration;

use reqwest::Response;
use reqwest::header::RETRY_AFTER;

use crate::error::{AiError, Result};

/// Error bodies longer than this are cut before they reach logs.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmRetryConfig {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for LlmRetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl LlmRetryConfig {
    /// No retries at all.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Wait before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32, retry_after_secs: Option<u64>) -> Duration {
        let delay = match retry_after_secs {
            Some(seconds) => Duration::from_secs(seconds),
            None => {
                let factor = 1u32
                    .checked_shl(retry.saturating_sub(1))
                    .unwrap_or(u32::MAX);
                self.initial_delay.saturating_mul(factor)
            }
        };
        delay.min(self.max_delay)
    }

    /// Run `attempt` until it succeeds or the error is final.
    pub async fn run<T, F, Fut>(&self, provider: &str, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retry = 0;
        loop {
            match attempt().await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_retryable() && retry < self.max_retries => {
                    retry += 1;
                    let delay = self.delay_for(retry, error.retry_after());
                    tracing::warn!(
                        provider,
                        retry,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Retrying LLM request"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

/// Turn a non-2xx response into `AiError::LlmHttp`, keeping any `Retry-After`.
pub async fn error_from_response(response: Response, provider: &str) -> AiError {
    let status = response.status().as_u16();
    let retry_after_secs = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();

    AiError::LlmHttp {
        provider: provider.to_string(),
        status,
        message: truncate_body(body),
        retry_after_secs,
    }
}

fn truncate_body(mut body: String) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body;
    }
    let mut cut = MAX_ERROR_BODY;
    while !body.is_char_boundary(cut) {
        cut -= 1;
    }
    body.truncate(cut);
    body.push_str("... [truncated]");
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> LlmRetryConfig {
        LlmRetryConfig {
            max_retries: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    fn http_error(status: u16) -> AiError {
        AiError::LlmHttp {
            provider: "Test".to_string(),
            status,
            message: String::new(),
            retry_after_secs: None,
        }
    }

    #[test]
    fn test_delay_doubles_until_cap() {
        let config = LlmRetryConfig::default();
        assert_eq!(config.delay_for(1, None), Duration::from_millis(200));
        assert_eq!(config.delay_for(2, None), Duration::from_millis(400));
        assert_eq!(config.delay_for(5, None), Duration::from_millis(3200));
        assert_eq!(config.delay_for(6, None), Duration::from_secs(5));
        assert_eq!(config.delay_for(64, None), Duration::from_secs(5));
    }

    #[test]
    fn test_retry_after_replaces_backoff_but_is_capped() {
        let config = LlmRetryConfig::default();
        assert_eq!(config.delay_for(3, Some(2)), Duration::from_secs(2));
        assert_eq!(config.delay_for(1, Some(600)), Duration::from_secs(5));
    }

    #[test]
    fn test_truncate_body_respects_char_boundaries() {
        let body = "é".repeat(MAX_ERROR_BODY);
        let cut = truncate_body(body);
        assert!(cut.ends_with("... [truncated]"));
        assert!(cut.len() <= MAX_ERROR_BODY + "... [truncated]".len());

        assert_eq!(truncate_body("short".to_string()), "short");
    }

    #[tokio::test]
    async fn test_run_retries_retryable_errors() {
        let calls = AtomicU32::new(0);
        let result = fast()
            .run("Test", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(http_error(503))
                } else {
                    Ok("done")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_stops_on_final_error() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = fast()
            .run("Test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(http_error(400))
            })
            .await;

        assert!(matches!(result, Err(AiError::LlmHttp { status: 400, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = fast()
            .run("Test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(http_error(429))
            })
            .await;

        assert!(matches!(result, Err(AiError::LlmHttp { status: 429, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
