//! Local HTTP front for the gateway.
//!
//! # Responsibilities
//! - Create the Axum router with a single catch-all handler
//! - Wire up middleware (request ID, tracing)
//! - Turn each HTTP request into an invocation and render the envelope
//!
//! # Design Decisions
//! - Request IDs are UUID v4, set before tracing so spans carry them
//! - Graceful shutdown is driven by a cancellation token, not a signal,
//!   so callers and tests can stop the server deterministically

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, Request},
    response::Response,
    Router,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::http::request::{event_from_parts, X_REQUEST_ID};
use crate::http::response::render;
use crate::invocation::InvocationHandler;

/// HTTP server exposing the invocation handler.
pub struct GatewayServer {
    handler: InvocationHandler,
}

impl GatewayServer {
    pub fn new(handler: InvocationHandler) -> Self {
        Self { handler }
    }

    /// Build the Axum router with all middleware layers.
    pub fn router(&self) -> Router {
        let request_id = HeaderName::from_static(X_REQUEST_ID);
        Router::new()
            .fallback(invoke_handler)
            .with_state(self.handler.clone())
            .layer(PropagateRequestIdLayer::new(request_id.clone()))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
    }

    /// Serve until `shutdown` is cancelled, then stop the image worker.
    pub async fn run(self, listener: TcpListener, shutdown: CancellationToken) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await?;

        self.handler.shutdown();
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn invoke_handler(State(handler): State<InvocationHandler>, request: Request<Body>) -> Response {
    let (parts, _body) = request.into_parts();
    let event = event_from_parts(&parts);
    render(handler.handle(event).await)
}
