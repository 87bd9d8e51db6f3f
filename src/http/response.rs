//! Envelope to HTTP response rendering.
//!
//! # Responsibilities
//! - Map envelope status and headers onto an HTTP response
//! - Decode base64 bodies back to raw image bytes
//!
//! # Design Decisions
//! - A malformed envelope renders as a bare 500 instead of panicking

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::transform::ResponseEnvelope;

pub fn render(envelope: ResponseEnvelope) -> Response {
    let status = match StatusCode::from_u16(envelope.status_code) {
        Ok(status) => status,
        Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    };

    let body = if envelope.is_base64_encoded {
        match STANDARD.decode(envelope.body.as_bytes()) {
            Ok(bytes) => Body::from(bytes),
            Err(e) => {
                tracing::error!(error = %e, "Envelope body is not valid base64");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
    } else {
        Body::from(envelope.body)
    };

    let mut response = Response::new(body);
    *response.status_mut() = status;
    let headers = response.headers_mut();
    for (name, value) in &envelope.headers {
        match (HeaderName::try_from(name.as_str()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => tracing::debug!(header = %name, "Skipping invalid envelope header"),
        }
    }
    response
}
