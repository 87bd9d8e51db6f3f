//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get as route_get,
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;

use image_gateway::config::GatewayConfig;
use image_gateway::invocation::{InvocationEvent, InvocationHandler};
use image_gateway::observability::usage::{UsageError, UsageEvent, UsageReporter};
use image_gateway::storage::{BlobStore, MemoryBlobStore, StorageError};
use image_gateway::transform::ResponseEnvelope;

pub const SECRET: &str = "s3cret";
pub const BUCKET: &str = "rendered";

/// One request observed by a test engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub path: String,
    pub accept: Option<String>,
}

/// Records every non-health request an engine receives.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl Recorder {
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn hits(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn record(&self, uri: &Uri, headers: &HeaderMap) {
        let accept = headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.requests.lock().unwrap().push(RecordedRequest {
            path: uri.path().to_string(),
            accept,
        });
    }
}

/// Engine answering every image path with `body` as `content_type`.
pub fn image_engine(recorder: Recorder, content_type: &'static str, body: Bytes) -> Router {
    Router::new()
        .route("/healthcheck", route_get(|| async { "WORKING" }))
        .fallback(move |uri: Uri, headers: HeaderMap| {
            let recorder = recorder.clone();
            let body = body.clone();
            async move {
                recorder.record(&uri, &headers);
                let mut response = Response::new(axum::body::Body::from(body));
                let out = response.headers_mut();
                out.insert(header::CONTENT_TYPE, content_type.parse().unwrap());
                out.insert(header::CACHE_CONTROL, "max-age=31536000,public".parse().unwrap());
                out.insert(header::EXPIRES, "Thu, 01 Jan 2037 00:00:00 GMT".parse().unwrap());
                out.insert(header::ETAG, "\"abc123\"".parse().unwrap());
                out.insert(header::DATE, "Mon, 19 Oct 2026 10:00:00 GMT".parse().unwrap());
                if headers.contains_key(header::ACCEPT) {
                    out.insert(header::VARY, "Accept".parse().unwrap());
                }
                response
            }
        })
}

/// Engine answering every image path with a bare status.
pub fn status_engine(recorder: Recorder, status: StatusCode) -> Router {
    Router::new()
        .route("/healthcheck", route_get(|| async { "WORKING" }))
        .fallback(move |uri: Uri, headers: HeaderMap| {
            let recorder = recorder.clone();
            async move {
                recorder.record(&uri, &headers);
                (status, "upstream says no").into_response()
            }
        })
}

/// Engine whose liveness endpoint never answers 200.
pub fn unhealthy_engine(recorder: Recorder) -> Router {
    Router::new()
        .route("/healthcheck", route_get(|| async { StatusCode::SERVICE_UNAVAILABLE }))
        .fallback(move |uri: Uri, headers: HeaderMap| {
            let recorder = recorder.clone();
            async move {
                recorder.record(&uri, &headers);
                StatusCode::OK
            }
        })
}

/// Engine that answers image paths only after `delay`.
pub fn slow_engine(delay: Duration) -> Router {
    Router::new()
        .route("/healthcheck", route_get(|| async { "WORKING" }))
        .fallback(move || async move {
            tokio::time::sleep(delay).await;
            StatusCode::OK
        })
}

/// Engine that drops the connection mid-request on image paths.
pub fn dropping_engine() -> Router {
    Router::new()
        .route("/healthcheck", route_get(|| async { "WORKING" }))
        .fallback(crash)
}

async fn crash() -> StatusCode {
    panic!("image engine crashed")
}

/// Config with the socket inside `dir`, fast probes and a persist secret.
pub fn test_config(dir: &Path) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.server.socket_path = dir.join("image.sock");
    config.server.probe_attempts = 20;
    config.server.probe_interval_ms = 10;
    config.persist.save_secret = Some(SECRET.to_string());
    config.persist.save_bucket = Some(BUCKET.to_string());
    config
}

pub fn handler(config: GatewayConfig, engine: Router, store: Arc<MemoryBlobStore>) -> InvocationHandler {
    InvocationHandler::builder(config, Arc::new(engine))
        .blob_store(store)
        .build()
}

pub fn get(path: &str) -> InvocationEvent {
    InvocationEvent::new("GET", path)
}

pub fn decode(envelope: &ResponseEnvelope) -> Vec<u8> {
    assert!(envelope.is_base64_encoded, "envelope is not base64: {envelope:?}");
    STANDARD.decode(&envelope.body).unwrap()
}

/// Counts delivered usage reports.
#[derive(Debug, Default)]
pub struct CountingReporter {
    delivered: AtomicUsize,
    statuses: Mutex<Vec<u16>>,
}

impl CountingReporter {
    pub fn delivered(&self) -> usize {
        self.delivered.load(Ordering::SeqCst)
    }

    pub fn statuses(&self) -> Vec<u16> {
        self.statuses.lock().unwrap().clone()
    }
}

#[async_trait]
impl UsageReporter for CountingReporter {
    async fn report(&self, event: UsageEvent) -> Result<(), UsageError> {
        self.statuses.lock().unwrap().push(event.status_code);
        self.delivered.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Store whose writes panic.
#[derive(Debug, Default)]
pub struct PanickingStore;

#[async_trait]
impl BlobStore for PanickingStore {
    async fn put(&self, _bucket: &str, _key: &str, _body: Bytes, _content_type: &str) -> Result<(), StorageError> {
        panic!("blob store exploded");
    }
}

/// Poll `check` until it holds or a second passes.
pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
