//! HTTP request to invocation event conversion.
//!
//! # Responsibilities
//! - Carry method, path and headers into an [`InvocationEvent`]
//! - Propagate the request ID assigned by the request-id layer
//!
//! # Design Decisions
//! - The request body is ignored; the gateway only renders paths
//! - Headers that are not valid UTF-8 are dropped, not rejected

use axum::http::request::Parts;

use crate::invocation::InvocationEvent;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Build the invocation event for an HTTP request.
pub fn event_from_parts(parts: &Parts) -> InvocationEvent {
    let mut event = InvocationEvent::new(parts.method.as_str(), parts.uri.path());
    for (name, value) in &parts.headers {
        match value.to_str() {
            Ok(value) => event = event.with_header(name.as_str(), value),
            Err(_) => tracing::debug!(header = %name, "Dropping non UTF-8 header"),
        }
    }
    if let Some(id) = parts.headers.get(X_REQUEST_ID).and_then(|v| v.to_str().ok()) {
        event = event.with_request_id(id);
    }
    event
}
