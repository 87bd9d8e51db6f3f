//! Upstream response validation and transformation.
//!
//! # Data Flow
//! ```text
//! UpstreamResponse
//!     → status check (non-200 passes through as an error envelope)
//!     → persist.rs decision (Skip / Reject / PersistAndReturn / PersistAndContinue)
//!     → size limit
//!     → encode.rs (supported subtypes only)
//!     → envelope.rs
//! ```
//!
//! # Design Decisions
//! - Failures are returned as [`GatewayError`]; the invocation boundary turns
//!   them into envelopes so every error path shares one formatter
//! - The size limit is checked before the format, so an oversized body always
//!   reports "body size is too long"

pub mod encode;
pub mod envelope;
pub mod persist;

use std::sync::Arc;

use serde_json::json;

use crate::config::PersistConfig;
use crate::error::GatewayError;
use crate::invocation::request::IncomingRequest;
use crate::observability::metrics;
use crate::proxy::UpstreamResponse;
use crate::storage::BlobStore;

pub use encode::{encode_image, image_subtype, SUPPORTED_SUBTYPES};
pub use envelope::{CacheHeaders, EnvelopeBuilder, ResponseEnvelope, DEFAULT_CACHE_CONTROL, NO_CACHE};
pub use persist::{decide, PersistDecision, SAVE_KEY_HEADER, SAVE_SECRET_HEADER};

/// Turns upstream responses into envelopes.
#[derive(Debug, Clone)]
pub struct ResponseTransformer {
    envelopes: EnvelopeBuilder,
    store: Arc<dyn BlobStore>,
    save_secret: Option<String>,
    bucket: Option<String>,
    max_payload_bytes: u64,
}

impl ResponseTransformer {
    pub fn new(
        envelopes: EnvelopeBuilder,
        persist: &PersistConfig,
        max_payload_bytes: u64,
        store: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            envelopes,
            store,
            save_secret: persist.save_secret.clone(),
            bucket: persist.bucket().map(str::to_string),
            max_payload_bytes,
        }
    }

    pub fn envelopes(&self) -> &EnvelopeBuilder {
        &self.envelopes
    }

    pub async fn process(
        &self,
        response: UpstreamResponse,
        negotiated: bool,
        request: &IncomingRequest,
    ) -> Result<ResponseEnvelope, GatewayError> {
        if response.status != 200 {
            return Err(GatewayError::UpstreamError(response.status));
        }

        let vary = if negotiated {
            response.header("vary").map(str::to_string)
        } else {
            None
        };
        let content_length = response.content_length();
        tracing::debug!(content_length, content_type = %response.content_type(), "Upstream image received");

        match persist::decide(request, self.save_secret.as_deref()) {
            PersistDecision::Skip => {}
            PersistDecision::Reject => return Err(GatewayError::PersistAuthFailure),
            PersistDecision::PersistAndReturn { key } => {
                self.persist(&key, &response).await?;
                return Ok(self.envelopes.json(201, &json!({ "size": content_length }), DEFAULT_CACHE_CONTROL));
            }
            PersistDecision::PersistAndContinue { key } => {
                self.persist(&key, &response).await?;
            }
        }

        if content_length > self.max_payload_bytes {
            return Err(GatewayError::PayloadTooLarge(content_length));
        }

        let content_type = response.content_type();
        let Some(encoded) = encode_image(content_type, &response.body) else {
            return Err(GatewayError::UnsupportedFormat(content_type.to_string()));
        };

        let cache = CacheHeaders {
            cache_control: response.header("cache-control").map(str::to_string),
            expires: response.header("expires").map(str::to_string),
            etag: response.header("etag").map(str::to_string),
            date: response.header("date").map(str::to_string),
            vary,
        };
        Ok(self.envelopes.image(encoded, content_type, cache))
    }

    async fn persist(&self, key: &str, response: &UpstreamResponse) -> Result<(), GatewayError> {
        let bucket = self.bucket.as_deref().ok_or(GatewayError::PersistBucketMissing)?;
        self.store
            .put(bucket, key, response.body.clone(), response.content_type())
            .await?;
        metrics::record_persisted(response.body.len());
        tracing::debug!(bucket = %bucket, key = %key, bytes = response.body.len(), "File saved");
        Ok(())
    }
}
