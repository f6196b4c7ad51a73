use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Exponential backoff policy for transient broker errors.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            max_attempts: 8,
        }
    }
}

impl RetryPolicy {
    fn next_delay(&self, current: Duration) -> Duration {
        let scaled = Duration::from_secs_f64(current.as_secs_f64() * self.multiplier);
        scaled.min(self.max_delay)
    }
}

/// Runs `operation` until it succeeds or the policy's attempts are exhausted.
/// The last error is returned; callers decide whether to surface or degrade.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> anyhow::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut delay = policy.initial_delay;
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt == max_attempts => {
                return Err(e.context(format!(
                    "{operation_name} failed after {attempt} attempts"
                )));
            }
            Err(e) => {
                warn!(
                    operation = operation_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient failure, backing off"
                );
                tokio::time::sleep(delay).await;
                delay = policy.next_delay(delay);
            }
        }
    }

    unreachable!("retry loop returns on final attempt")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            initial_delay: Duration::from_millis(1),
            multiplier: 2.0,
            max_delay: Duration::from_millis(4),
            max_attempts,
        }
    }

    #[tokio::test]
    async fn succeeds_first_try_without_sleeping() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result = retry_with_backoff(&fast_policy(8), "publish", move || {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, anyhow::Error>(42)
            }
        })
        .await
        .unwrap();

        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result = retry_with_backoff(&fast_policy(8), "publish", move || {
            let calls = calls_clone.clone();
            async move {
                let attempt = calls.fetch_add(1, Ordering::SeqCst);
                if attempt < 2 {
                    Err(anyhow::anyhow!("broker unavailable"))
                } else {
                    Ok("acked")
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result, "acked");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_attempts_and_returns_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: anyhow::Result<()> = retry_with_backoff(&fast_policy(3), "publish", move || {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(anyhow::anyhow!("broker unavailable"))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(result.unwrap_err().to_string().contains("after 3 attempts"));
    }

    #[test]
    fn delay_growth_is_capped() {
        let policy = RetryPolicy::default();
        let mut delay = policy.initial_delay;
        for _ in 0..20 {
            delay = policy.next_delay(delay);
        }
        assert_eq!(delay, policy.max_delay);
    }
}
