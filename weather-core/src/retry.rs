//! Bounded exponential-backoff retry for outbound provider calls.
//!
//! Retried:
//! - HTTP statuses listed in [`RetryConfig::retriable_status_codes`]
//! - connection failures, timeouts and other transport errors
//!
//! Everything else propagates unchanged after the first attempt.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use crate::error::WeatherError;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10);
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;
/// Server errors, rate limiting and request timeout.
pub const DEFAULT_RETRIABLE_STATUS_CODES: [u16; 6] = [500, 502, 503, 504, 429, 408];

/// Retry schedule. Built once per client and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    backoff_factor: f64,
    retriable_status_codes: HashSet<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            retriable_status_codes: DEFAULT_RETRIABLE_STATUS_CODES.into_iter().collect(),
        }
    }
}

impl RetryConfig {
    /// Validated constructor. `None` status codes means the defaults.
    pub fn new(
        max_retries: u32,
        base_delay: Duration,
        max_delay: Duration,
        backoff_factor: f64,
        retriable_status_codes: Option<HashSet<u16>>,
    ) -> Result<Self, WeatherError> {
        if base_delay.is_zero() {
            return Err(WeatherError::config("retry base delay must be greater than zero"));
        }
        if max_delay.is_zero() {
            return Err(WeatherError::config("retry max delay must be greater than zero"));
        }
        if !backoff_factor.is_finite() || backoff_factor <= 1.0 {
            return Err(WeatherError::config(format!(
                "retry backoff factor must be greater than 1, got {backoff_factor}"
            )));
        }

        Ok(Self {
            max_retries,
            base_delay,
            max_delay,
            backoff_factor,
            retriable_status_codes: retriable_status_codes
                .unwrap_or_else(|| DEFAULT_RETRIABLE_STATUS_CODES.into_iter().collect()),
        })
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn backoff_factor(&self) -> f64 {
        self.backoff_factor
    }

    pub fn retriable_status_codes(&self) -> &HashSet<u16> {
        &self.retriable_status_codes
    }

    /// `min(base_delay * backoff_factor^attempt, max_delay)`, no jitter.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exponent);

        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    pub fn is_retriable(&self, error: &WeatherError) -> bool {
        match error {
            WeatherError::HttpStatus { status, .. } | WeatherError::Provider { status, .. } => {
                self.retriable_status_codes.contains(status)
            }
            WeatherError::Network(e) => match e.status() {
                Some(status) => self.retriable_status_codes.contains(&status.as_u16()),
                // Builder errors mean a malformed request; resending cannot help.
                None => !e.is_builder(),
            },
            _ => false,
        }
    }
}

/// Run `operation`, retrying retriable failures with exponential backoff.
///
/// Fatal errors are returned as-is after a single attempt. After
/// `max_retries + 1` retriable failures the last error is wrapped in
/// [`WeatherError::ProviderUnavailable`].
pub async fn call_with_retry<T, F, Fut>(
    config: &RetryConfig,
    provider_name: &str,
    mut operation: F,
) -> Result<T, WeatherError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, WeatherError>>,
{
    let mut attempt: u32 = 0;

    loop {
        let error = match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!(provider = provider_name, attempt = attempt + 1, "Request succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if !config.is_retriable(&error) {
            tracing::error!(
                provider = provider_name,
                attempt = attempt + 1,
                error = %error,
                "Non-retriable error from provider"
            );
            return Err(error);
        }

        if attempt >= config.max_retries {
            tracing::error!(
                provider = provider_name,
                max_retries = config.max_retries,
                error = %error,
                "Max retries exceeded"
            );
            return Err(WeatherError::ProviderUnavailable {
                provider: provider_name.to_string(),
                source: Box::new(error),
            });
        }

        let delay = config.calculate_delay(attempt);
        tracing::warn!(
            provider = provider_name,
            attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Retriable error from provider, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
