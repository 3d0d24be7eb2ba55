//! Error classification and retry policy for external service calls.

use std::thread;
use std::time::Duration;

use backon::{BlockingRetryable, ExponentialBuilder};
use reqwest::StatusCode;
use thiserror::Error;

use crate::ui::prelude::*;
use crate::video::config::EngineConfig;

const MAX_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{service}: quota or rate limit exhausted: {detail}")]
    ResourceExhausted { service: &'static str, detail: String },
    #[error("{service}: service unavailable: {detail}")]
    Unavailable { service: &'static str, detail: String },
    #[error("{service}: request timed out: {detail}")]
    DeadlineExceeded { service: &'static str, detail: String },
    #[error("{service}: request rejected with HTTP {status}: {detail}")]
    Rejected {
        service: &'static str,
        status: u16,
        detail: String,
    },
    #[error("{service}: unusable response: {detail}")]
    Malformed { service: &'static str, detail: String },
    #[error("{service}: {detail}")]
    Transport { service: &'static str, detail: String },
    #[error("{service} is not configured: {what} is missing")]
    NotConfigured {
        service: &'static str,
        what: &'static str,
    },
}

impl ServiceError {
    /// Whether waiting and trying again can plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ServiceError::ResourceExhausted { .. }
                | ServiceError::Unavailable { .. }
                | ServiceError::DeadlineExceeded { .. }
        )
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(service: &'static str, status: StatusCode, body: &str) -> Self {
        let detail = truncate_detail(body);
        match status.as_u16() {
            429 => ServiceError::ResourceExhausted { service, detail },
            500 | 502 | 503 => ServiceError::Unavailable { service, detail },
            408 | 504 => ServiceError::DeadlineExceeded { service, detail },
            code => ServiceError::Rejected {
                service,
                status: code,
                detail,
            },
        }
    }

    /// Classify a transport-level failure from reqwest.
    pub fn from_reqwest(service: &'static str, err: reqwest::Error) -> Self {
        let detail = err.to_string();
        if err.is_timeout() {
            ServiceError::DeadlineExceeded { service, detail }
        } else if err.is_connect() {
            ServiceError::Unavailable { service, detail }
        } else if let Some(status) = err.status() {
            ServiceError::from_status(service, status, &detail)
        } else if err.is_decode() {
            ServiceError::Malformed { service, detail }
        } else {
            ServiceError::Transport { service, detail }
        }
    }

    pub fn malformed(service: &'static str, detail: impl Into<String>) -> Self {
        ServiceError::Malformed {
            service,
            detail: detail.into(),
        }
    }
}

fn truncate_detail(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= 200 {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(200).collect();
    format!("{cut}…")
}

/// Exponential backoff for transient failures: attempt `k` waits
/// `initial_backoff * 2^(k-1)` before running.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &EngineConfig) -> Self {
        if !config.retry_enabled {
            return Self::no_retry();
        }
        Self {
            max_attempts: config.retry_max_attempts.max(1),
            initial_backoff: Duration::try_from_secs_f64(config.retry_backoff_seconds)
                .map_or(MAX_BACKOFF, |backoff| backoff.min(MAX_BACKOFF)),
        }
    }

    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
        }
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.initial_backoff)
            .with_max_delay(MAX_BACKOFF)
            .with_factor(2.0)
            .with_max_times(self.max_attempts.saturating_sub(1))
    }

    /// Run `op`, retrying transient errors until the attempt cap is reached.
    pub fn run<T>(
        &self,
        label: &str,
        op: impl FnMut() -> Result<T, ServiceError>,
    ) -> Result<T, ServiceError> {
        op.retry(self.backoff())
            .sleep(thread::sleep)
            .when(ServiceError::is_transient)
            .notify(|err, delay| {
                emit(
                    Level::Warn,
                    "retry.transient",
                    &format!("{label} failed ({err}); retrying in {:.1}s", delay.as_secs_f64()),
                    Some(serde_json::json!({
                        "operation": label,
                        "delay_ms": delay.as_millis() as u64,
                        "error": err.to_string(),
                    })),
                );
            })
            .call()
    }
}
