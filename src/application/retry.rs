use crate::infrastructure::config::RetrySettings;
use crate::infrastructure::error::InfraError;
use log::debug;
use std::future::Future;
use tokio::time::{Duration, sleep};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 500,
        }
    }
}

impl From<RetrySettings> for RetryPolicy {
    fn from(settings: RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            delay_ms: settings.delay_ms,
        }
    }
}

impl RetryPolicy {
    pub fn delay_after(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.delay_ms.saturating_mul(u64::from(attempt.max(1))))
    }

    pub async fn run<T, F, Fut>(&self, action: &str, mut operation: F) -> Result<T, InfraError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, InfraError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt: u32 = 1;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) if should_retry(&error) && attempt < max_attempts => {
                    debug!("{action} failed on attempt {attempt}/{max_attempts}: {error}");
                    sleep(self.delay_after(attempt)).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

/// Only transport failures are retried; rejections and validation errors are final.
fn should_retry(error: &InfraError) -> bool {
    error.is_transport()
}
