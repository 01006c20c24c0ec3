use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::warn;

use super::RunnerError;

pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    /// Three retries, 1s -> 2s -> 4s.
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    #[cfg(test)]
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }
}

pub fn build_client(timeout: Duration) -> Result<Client, RunnerError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| RunnerError::Init(format!("failed to build http client: {err}")))
}

pub fn is_retryable(error: &RunnerError) -> bool {
    match error {
        RunnerError::Network(_) => true,
        RunnerError::Api { status, .. } => *status == 429 || (500..600).contains(status),
        _ => false,
    }
}

pub fn execute_with_retry<T, F>(policy: &RetryPolicy, mut operation: F) -> Result<T, RunnerError>
where
    F: FnMut() -> Result<T, RunnerError>,
{
    let mut delay = policy.initial_delay;
    let mut attempt = 0;

    loop {
        match operation() {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retryable(&err) || attempt >= policy.max_retries {
                    return Err(err);
                }

                attempt += 1;
                warn!(
                    attempt,
                    max_attempts = policy.max_retries + 1,
                    error = %err,
                    delay_ms = delay.as_millis() as u64,
                    "request failed, retrying"
                );
                std::thread::sleep(delay);
                delay = (delay * 2).min(policy.max_delay);
            }
        }
    }
}

pub fn status_error(status: u16, body: String) -> RunnerError {
    match status {
        401 | 403 => RunnerError::Auth(format!("status {status}: {}", body.trim())),
        _ => RunnerError::Api {
            status,
            message: body.trim().to_string(),
        },
    }
}

/// Sends the request and decodes a JSON body, mapping transport and status failures.
pub fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, RunnerError> {
    let response = request
        .send()
        .map_err(|err| RunnerError::Network(err.to_string()))?;
    let status = response.status();
    let body = response
        .text()
        .map_err(|err| RunnerError::Network(format!("failed to read response body: {err}")))?;

    if !status.is_success() {
        return Err(status_error(status.as_u16(), body));
    }

    serde_json::from_str(&body).map_err(|err| RunnerError::Api {
        status: status.as_u16(),
        message: format!("failed to parse response: {err}"),
    })
}
