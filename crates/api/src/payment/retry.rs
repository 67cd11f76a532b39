use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use super::gateway::GatewayError;

/// Exponential backoff for gateway calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt as i32);
        let millis = self.initial_delay.as_millis() as f64 * factor;
        if !millis.is_finite() || millis >= self.max_delay.as_millis() as f64 {
            return self.max_delay;
        }
        Duration::from_millis(millis as u64)
    }
}

/// Run `operation`, retrying only transient gateway failures.
pub async fn retry_transient<F, Fut, T>(
    policy: &RetryPolicy,
    label: &str,
    mut operation: F,
) -> Result<T, GatewayError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GatewayError>>,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    info!(attempt, "{} succeeded after retry", label);
                }
                return Ok(value);
            }
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                let delay = policy.delay_for_attempt(attempt);
                warn!(attempt, ?delay, "{} failed ({}), retrying", label, e);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            multiplier: 2.0,
        }
    }

    #[test]
    fn delay_grows_and_caps() {
        let policy = fast();
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(1));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(2));
        assert_eq!(policy.delay_for_attempt(5), Duration::from_millis(4));
    }

    #[tokio::test]
    async fn retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let result = retry_transient(&fast(), "refund", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(GatewayError::Network("reset".into()))
                } else {
                    Ok("rfnd_1")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "rfnd_1");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_transient(&fast(), "refund", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(GatewayError::Api {
                    status: 400,
                    body: "bad amount".into(),
                })
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_transient(&fast(), "refund", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(GatewayError::Network("timeout".into())) }
        })
        .await;

        assert!(matches!(result, Err(GatewayError::Network(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
