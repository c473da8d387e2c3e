//! Adaptive retry transport and its error model.

mod backoff;
mod error;
mod parse;
mod retry;

pub use backoff::BackoffPolicy;
pub use error::{HttpError, HttpResponse, TransportError, is_retryable_status};
pub use parse::parse_error_response;
pub use retry::{RetryTransport, TransportOptions};
