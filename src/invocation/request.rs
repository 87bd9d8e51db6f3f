//! Invocation events and the validated request derived from them.
//!
//! # Responsibilities
//! - Deserialize API-gateway style proxy events
//! - Validate the HTTP method (GET, HEAD, POST only)
//! - Provide header lookup for the proxy and persist path
//!
//! # Design Decisions
//! - Headers are stored exactly as received; lookup tries the exact key
//!   first, then falls back to a case-insensitive match
//! - `IncomingRequest` is immutable for the duration of an invocation

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// Raw invocation event as delivered by the front end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationEvent {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_method: Option<String>,
    #[serde(default)]
    pub request_context: RequestContext,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl InvocationEvent {
    pub fn new(method: &str, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            headers: None,
            http_method: None,
            request_context: RequestContext {
                http_method: Some(method.to_string()),
                request_id: None,
            },
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(HashMap::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_context.request_id = Some(request_id.into());
        self
    }

    /// Method from the request context, falling back to the top-level field.
    pub fn method(&self) -> &str {
        self.request_context
            .http_method
            .as_deref()
            .or(self.http_method.as_deref())
            .unwrap_or("")
    }
}

/// Methods the gateway accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Head,
    Post,
}

impl HttpMethod {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "GET" => Some(HttpMethod::Get),
            "HEAD" => Some(HttpMethod::Head),
            "POST" => Some(HttpMethod::Post),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated request for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingRequest {
    pub method: HttpMethod,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub request_id: Option<String>,
}

impl IncomingRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .or_else(|| {
                self.headers
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(name))
                    .map(|(_, v)| v)
            })
            .map(String::as_str)
    }
}

impl TryFrom<InvocationEvent> for IncomingRequest {
    type Error = GatewayError;

    fn try_from(event: InvocationEvent) -> Result<Self, Self::Error> {
        let raw_method = event.method().to_string();
        let method = HttpMethod::parse(&raw_method).ok_or(GatewayError::MethodNotAllowed(raw_method))?;
        Ok(Self {
            method,
            path: event.path,
            headers: event.headers.unwrap_or_default(),
            request_id: event.request_context.request_id,
        })
    }
}
