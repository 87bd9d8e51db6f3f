//! Request proxying to the local image service.
//!
//! # Data Flow
//! ```text
//! IncomingRequest
//!     → rewrite.rs (optional path rewrite, failures ignored)
//!     → safety prefix (/unsafe when unsafe URLs are allowed)
//!     → content negotiation (copy Accept when auto-webp is on)
//!     → session.rs (GET over the local socket)
//!     → ForwardOutcome { response, negotiated }
//! ```
//!
//! # Design Decisions
//! - No retries here; the supervisor has verified liveness before forwarding
//! - HEAD and POST are forwarded as GET; the image service only renders

pub mod rewrite;
pub mod session;
pub mod signing;

use std::sync::Arc;

use crate::config::FeatureConfig;
use crate::error::GatewayError;
use crate::invocation::request::IncomingRequest;

pub use rewrite::{NoRewrite, PathRewriter, PrefixRewriter, RewriteError};
pub use session::{UpstreamResponse, UpstreamSession};
pub use signing::{encode_path, UrlSigner};

pub const UNSAFE_PREFIX: &str = "/unsafe";

/// Raw upstream response plus whether negotiation influenced it.
#[derive(Debug, Clone)]
pub struct ForwardOutcome {
    pub response: UpstreamResponse,
    pub negotiated: bool,
}

/// Builds and issues the outbound request for an invocation.
#[derive(Debug, Clone)]
pub struct RequestProxy {
    rewriter: Arc<dyn PathRewriter>,
    rewrite_enabled: bool,
    allow_unsafe: bool,
    auto_webp: bool,
}

impl RequestProxy {
    pub fn new(features: &FeatureConfig, rewriter: Arc<dyn PathRewriter>) -> Self {
        Self {
            rewriter,
            rewrite_enabled: features.rewrite_enabled,
            allow_unsafe: features.allow_unsafe_url,
            auto_webp: features.auto_webp,
        }
    }

    /// Path sent to the image service for `path`.
    pub fn compose_path(&self, path: &str) -> String {
        let mut composed = path.to_string();
        if self.rewrite_enabled {
            match self.rewriter.rewrite(&composed) {
                Ok(rewritten) => {
                    tracing::debug!(from = %path, to = %rewritten, "Path rewritten");
                    composed = rewritten;
                }
                Err(e) => tracing::error!(path = %path, error = %e, "Invalid http path, rewrite skipped"),
            }
        }
        if self.allow_unsafe {
            composed = format!("{UNSAFE_PREFIX}{composed}");
        }
        encode_path(&composed)
    }

    /// Outbound negotiation headers and whether negotiation is active.
    pub fn negotiation_headers(&self, request: &IncomingRequest) -> (bool, Vec<(String, String)>) {
        let mut headers = Vec::new();
        if self.auto_webp {
            if let Some(accept) = request.header("Accept") {
                headers.push(("Accept".to_string(), accept.to_string()));
            }
        }
        (self.auto_webp, headers)
    }

    pub async fn forward(
        &self,
        request: &IncomingRequest,
        session: &mut UpstreamSession,
    ) -> Result<ForwardOutcome, GatewayError> {
        tracing::debug!(method = %request.method, path = %request.path, "Original request");
        let path = self.compose_path(&request.path);
        let (negotiated, headers) = self.negotiation_headers(request);

        tracing::debug!(path = %path, negotiated, "Forwarding to image service");
        let response = session.get(&path, &headers).await?;
        tracing::debug!(status = response.status, bytes = response.body.len(), "Image service responded");

        Ok(ForwardOutcome { response, negotiated })
    }
}
