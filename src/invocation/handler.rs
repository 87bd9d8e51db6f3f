//! Per-invocation orchestration.
//!
//! # Responsibilities
//! - Validate the method before touching the image service
//! - Run supervisor, proxy and transformer strictly in sequence
//! - Convert every failure, including a panic, into an envelope
//! - Record metrics and dispatch usage reports without blocking
//!
//! # Design Decisions
//! - The handler is cheap to clone; clones share one supervisor
//! - The pipeline runs in its own task so a panic surfaces as a `JoinError`
//!   instead of unwinding through the caller

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::GatewayConfig;
use crate::engine::ImageEngine;
use crate::error::GatewayError;
use crate::invocation::request::{IncomingRequest, InvocationEvent};
use crate::observability::metrics;
use crate::observability::usage::{HttpUsageReporter, UsageDispatcher, UsageEvent, UsageReporter};
use crate::proxy::{PathRewriter, PrefixRewriter, RequestProxy};
use crate::storage::{BlobStore, FsBlobStore};
use crate::supervisor::Supervisor;
use crate::transform::{EnvelopeBuilder, ResponseEnvelope, ResponseTransformer};

/// Entry point for invocations.
#[derive(Debug, Clone)]
pub struct InvocationHandler {
    supervisor: Arc<Supervisor>,
    proxy: RequestProxy,
    transformer: ResponseTransformer,
    usage: Option<UsageDispatcher>,
}

impl InvocationHandler {
    pub fn builder(config: GatewayConfig, engine: Arc<dyn ImageEngine>) -> InvocationHandlerBuilder {
        InvocationHandlerBuilder {
            config,
            engine,
            blob_store: None,
            rewriter: None,
            usage_reporter: None,
        }
    }

    pub fn supervisor(&self) -> &Arc<Supervisor> {
        &self.supervisor
    }

    /// Handle one invocation. Always returns a well-formed envelope.
    pub async fn handle(&self, event: InvocationEvent) -> ResponseEnvelope {
        let start = Instant::now();
        let envelopes = self.transformer.envelopes();

        let request = match IncomingRequest::try_from(event) {
            Ok(request) => request,
            Err(e) => {
                tracing::error!(error = %e, "Rejected invocation");
                let envelope = e.into_envelope(envelopes);
                metrics::record_invocation(envelope.status_code, start);
                return envelope;
            }
        };

        let this = self.clone();
        let task_request = request.clone();
        let result = match tokio::spawn(async move { this.run(&task_request).await }).await {
            Ok(result) => result,
            Err(e) => Err(GatewayError::Internal(format!("invocation task failed: {e}"))),
        };

        let envelope = match result {
            Ok(envelope) => envelope,
            Err(e) => {
                let status = e.status_code();
                if status >= 500 {
                    tracing::error!(status, error = %e, path = %request.path, "Invocation failed");
                } else {
                    tracing::warn!(status, error = %e, path = %request.path, "Invocation failed");
                }
                e.into_envelope(envelopes)
            }
        };

        metrics::record_invocation(envelope.status_code, start);
        self.report_usage(&request, &envelope, start.elapsed());
        envelope
    }

    async fn run(&self, request: &IncomingRequest) -> Result<ResponseEnvelope, GatewayError> {
        let mut session = self.supervisor.acquire_session().await?;
        let outcome = self.proxy.forward(request, &mut session).await?;
        self.transformer
            .process(outcome.response, outcome.negotiated, request)
            .await
    }

    fn report_usage(&self, request: &IncomingRequest, envelope: &ResponseEnvelope, elapsed: Duration) {
        if let Some(usage) = &self.usage {
            let event = UsageEvent::new(
                usage.instance_id(),
                request.request_id.clone(),
                request.method.as_str(),
                envelope.status_code,
                elapsed,
                envelope.body.len(),
            );
            usage.dispatch(event);
        }
    }

    /// Stop the background worker.
    pub fn shutdown(&self) {
        self.supervisor.stop();
    }
}

/// Assembles an [`InvocationHandler`] with optional collaborator overrides.
pub struct InvocationHandlerBuilder {
    config: GatewayConfig,
    engine: Arc<dyn ImageEngine>,
    blob_store: Option<Arc<dyn BlobStore>>,
    rewriter: Option<Arc<dyn PathRewriter>>,
    usage_reporter: Option<Arc<dyn UsageReporter>>,
}

impl InvocationHandlerBuilder {
    /// Defaults to a filesystem store under `persist.store_root`.
    pub fn blob_store(mut self, store: Arc<dyn BlobStore>) -> Self {
        self.blob_store = Some(store);
        self
    }

    /// Defaults to the prefix rules from `features.rewrite_rules`.
    pub fn rewriter(mut self, rewriter: Arc<dyn PathRewriter>) -> Self {
        self.rewriter = Some(rewriter);
        self
    }

    /// Used only when anonymous usage reporting is enabled. Defaults to
    /// posting to `observability.usage_endpoint`.
    pub fn usage_reporter(mut self, reporter: Arc<dyn UsageReporter>) -> Self {
        self.usage_reporter = Some(reporter);
        self
    }

    pub fn build(self) -> InvocationHandler {
        let config = self.config;
        let envelopes = EnvelopeBuilder::from_config(&config.features);

        let store = self
            .blob_store
            .unwrap_or_else(|| Arc::new(FsBlobStore::new(config.persist.store_root.clone())));
        let rewriter = self
            .rewriter
            .unwrap_or_else(|| Arc::new(PrefixRewriter::new(config.features.rewrite_rules.clone())));

        let observability = &config.observability;
        let usage = if observability.send_anonymous_data {
            let reporter = self.usage_reporter.or_else(|| {
                observability
                    .usage_endpoint
                    .clone()
                    .map(|endpoint| Arc::new(HttpUsageReporter::new(endpoint)) as Arc<dyn UsageReporter>)
            });
            if reporter.is_none() {
                tracing::warn!("Anonymous usage reporting enabled without an endpoint; reports disabled");
            }
            reporter.map(|reporter| {
                UsageDispatcher::new(
                    reporter,
                    observability.usage_max_in_flight,
                    Duration::from_millis(observability.usage_timeout_ms),
                )
            })
        } else {
            None
        };

        InvocationHandler {
            supervisor: Arc::new(Supervisor::new(self.engine, config.server.clone())),
            proxy: RequestProxy::new(&config.features, rewriter),
            transformer: ResponseTransformer::new(envelopes, &config.persist, config.limits.max_payload_bytes, store),
            usage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBlobStore;
    use axum::Router;

    #[tokio::test]
    async fn unsupported_method_never_starts_worker() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = GatewayConfig::default();
        config.server.socket_path = dir.path().join("gw.sock");

        let handler = InvocationHandler::builder(config, Arc::new(Router::new()))
            .blob_store(Arc::new(MemoryBlobStore::new()))
            .build();

        let envelope = handler.handle(InvocationEvent::new("DELETE", "/a.jpg")).await;
        assert_eq!(envelope.status_code, 405);
        assert_eq!(handler.supervisor().generation(), 0);
        assert!(!dir.path().join("gw.sock").exists());
    }
}
