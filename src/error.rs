//! Invocation error taxonomy.
//!
//! Every variant resolves to a well-formed [`ResponseEnvelope`]; nothing
//! escapes the invocation boundary as a panic or a raw error.

use thiserror::Error;

use crate::storage::StorageError;
use crate::transform::envelope::{EnvelopeBuilder, ResponseEnvelope, NO_CACHE};

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Incoming method is not GET, HEAD or POST.
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),

    /// Health probes were exhausted without a 200.
    #[error("image service unavailable after {attempts} health probes")]
    UpstreamUnavailable { attempts: u32 },

    /// The image service answered with a non-200 status.
    #[error("image service returned status {0}")]
    UpstreamError(u16),

    #[error("body size is too long: {0} bytes")]
    PayloadTooLarge(u64),

    #[error("unsupported content type: {0}")]
    UnsupportedFormat(String),

    #[error("persist secret mismatch")]
    PersistAuthFailure,

    #[error("no persist bucket configured")]
    PersistBucketMissing,

    #[error("blob store error: {0}")]
    Storage(#[from] StorageError),

    #[error("upstream transport error: {0}")]
    Transport(#[from] hyper::Error),

    #[error("upstream request timed out")]
    Timeout,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid upstream request: {0}")]
    Http(#[from] axum::http::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Status code reported to the caller for this failure.
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::MethodNotAllowed(_) => 405,
            GatewayError::UpstreamUnavailable { .. } => 502,
            GatewayError::UpstreamError(status) => *status,
            GatewayError::PersistAuthFailure => 404,
            _ => 500,
        }
    }

    /// Convert the failure into the envelope returned to the caller.
    ///
    /// The body is always a generic JSON message; the error detail only goes
    /// to the logs.
    pub fn into_envelope(self, envelopes: &EnvelopeBuilder) -> ResponseEnvelope {
        let status = self.status_code();
        match self {
            GatewayError::MethodNotAllowed(_)
            | GatewayError::UpstreamUnavailable { .. }
            | GatewayError::UpstreamError(_)
            | GatewayError::PersistAuthFailure => envelopes.error(status),
            GatewayError::PayloadTooLarge(_) => envelopes.error_with_message(status, "body size is too long"),
            _ => envelopes.error_with_cache_control(status, NO_CACHE),
        }
    }
}
