//! Adaptive retry transport: timeout + exponential backoff around a `Sender`.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::backoff::BackoffPolicy;
use super::error::{HttpResponse, TransportError, is_retryable_status};
use super::parse::parse_error_response;
use crate::domain::RequestTarget;
use crate::ports::Sender;

/// Per-call knobs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransportOptions {
    /// Extra attempts after the first one (0 = single attempt).
    pub max_retries: u32,
    pub base_delay: Duration,
    /// Deadline for each individual attempt.
    pub timeout: Duration,
}

impl TransportOptions {
    /// One attempt under `timeout`, no backoff loop.
    pub fn single_attempt(timeout: Duration) -> Self {
        Self {
            max_retries: 0,
            timeout,
            ..Self::default()
        }
    }
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Wraps a single request/response exchange with timeout, cancellation and
/// retry of transient failures.
///
/// Retried: network errors, timeouts, 5xx, 429.
/// Returned immediately: success, redirects and every other 4xx.
pub struct RetryTransport {
    sender: Arc<dyn Sender>,
    defaults: TransportOptions,
}

impl RetryTransport {
    pub fn new(sender: Arc<dyn Sender>, defaults: TransportOptions) -> Self {
        Self { sender, defaults }
    }

    pub fn defaults(&self) -> &TransportOptions {
        &self.defaults
    }

    /// Run the attempt loop and return the last response (which may be a
    /// non-success status) or the last error.
    pub async fn execute(
        &self,
        request: &RequestTarget,
        options: &TransportOptions,
    ) -> Result<HttpResponse, TransportError> {
        let backoff = BackoffPolicy::new(options.base_delay);
        let mut attempt = 0u32;

        loop {
            // Dropping the send future on timeout aborts the in-flight exchange.
            let outcome = match tokio::time::timeout(options.timeout, self.sender.send(request)).await
            {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout(options.timeout)),
            };

            let retry_reason = match &outcome {
                Ok(resp) if is_retryable_status(resp.status) => Some(format!("HTTP {}", resp.status)),
                Err(err) if err.is_retryable() => Some(err.to_string()),
                _ => None,
            };

            let Some(reason) = retry_reason else {
                return outcome;
            };

            if attempt >= options.max_retries {
                debug!(
                    method = request.method(),
                    url = %request.url,
                    attempts = attempt + 1,
                    "retries exhausted: {reason}"
                );
                return outcome;
            }

            let delay = backoff.delay_for(attempt);
            warn!(
                method = request.method(),
                url = %request.url,
                attempt = attempt + 1,
                max_attempts = options.max_retries + 1,
                delay_ms = delay.as_millis() as u64,
                "transient failure, backing off: {reason}"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// `execute`, then turn the result into a parsed JSON body or a
    /// classified error. This is the call the queue manager uses.
    pub async fn fetch(
        &self,
        request: &RequestTarget,
        options: &TransportOptions,
    ) -> Result<serde_json::Value, TransportError> {
        let response = self.execute(request, options).await?;
        if !response.is_success() {
            return Err(TransportError::Http(parse_error_response(&response)));
        }
        response.json()
    }

    /// `fetch` with the transport's default options.
    pub async fn fetch_default(
        &self,
        request: &RequestTarget,
    ) -> Result<serde_json::Value, TransportError> {
        self.fetch(request, &self.defaults).await
    }
}
