//! Sender port - one request/response exchange, no retries, no timeout.
//!
//! The retry transport layers timeout and backoff on top of this seam, so
//! tests can script responses without a network.

use async_trait::async_trait;

use crate::domain::RequestTarget;
use crate::transport::{HttpResponse, TransportError};

#[async_trait]
pub trait Sender: Send + Sync {
    /// Perform exactly one exchange.
    ///
    /// Returns `Ok` for any response that arrived (including 4xx/5xx);
    /// `Err(TransportError::Network)` only when no response was received.
    async fn send(&self, request: &RequestTarget) -> Result<HttpResponse, TransportError>;
}
