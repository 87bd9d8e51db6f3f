//! Filesystem-backed image engine.
//!
//! # Responsibilities
//! - Answer the liveness endpoint
//! - Serve image files from a root directory for `/unsafe/<file>` or
//!   `/<signature>/<file>` paths
//! - Attach cache headers the gateway carries through
//!
//! # Design Decisions
//! - No image transformation; files are served as stored
//! - Paths containing `..` or other non-normal components are never served
//! - Signed paths are verified with the same [`UrlSigner`] the gateway exposes

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha1::{Digest, Sha1};

use crate::engine::ImageEngine;
use crate::proxy::signing::UrlSigner;

const CACHE_CONTROL: &str = "max-age=31536000,public";
const ONE_YEAR: Duration = Duration::from_secs(365 * 24 * 3600);

#[derive(Debug)]
struct EngineState {
    root: PathBuf,
    allow_unsafe: bool,
    signer: Option<UrlSigner>,
}

/// Serves image files from `root`.
#[derive(Debug, Clone)]
pub struct FsImageEngine {
    state: Arc<EngineState>,
}

impl FsImageEngine {
    pub fn new(root: impl Into<PathBuf>, allow_unsafe: bool, signer: Option<UrlSigner>) -> Self {
        Self {
            state: Arc::new(EngineState {
                root: root.into(),
                allow_unsafe,
                signer,
            }),
        }
    }
}

impl ImageEngine for FsImageEngine {
    fn router(&self) -> Router {
        Router::new()
            .route("/healthcheck", get(|| async { "WORKING" }))
            .fallback(serve_image)
            .with_state(self.state.clone())
    }
}

async fn serve_image(State(state): State<Arc<EngineState>>, uri: Uri, headers: HeaderMap) -> Response {
    let path = uri.path().trim_start_matches('/');
    let Some((first, rest)) = path.split_once('/') else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let authorized = if first == "unsafe" {
        state.allow_unsafe
    } else {
        state
            .signer
            .as_ref()
            .is_some_and(|signer| signer.verify(first, rest))
    };
    if !authorized {
        tracing::warn!(path = %uri.path(), "Rejected unsigned image path");
        return StatusCode::FORBIDDEN.into_response();
    }

    let Some(file) = resolve(&state.root, rest) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let bytes = match tokio::fs::read(&file).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(file = %file.display(), error = %e, "Image not readable");
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    let now = SystemTime::now();
    let etag = format!("\"{}\"", URL_SAFE_NO_PAD.encode(Sha1::digest(&bytes)));
    let mut response = bytes.into_response();
    let out = response.headers_mut();
    out.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type_for(&file)));
    out.insert(header::CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL));
    if let Ok(value) = HeaderValue::from_str(&httpdate::fmt_http_date(now + ONE_YEAR)) {
        out.insert(header::EXPIRES, value);
    }
    if let Ok(value) = HeaderValue::from_str(&httpdate::fmt_http_date(now)) {
        out.insert(header::DATE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&etag) {
        out.insert(header::ETAG, value);
    }
    if headers.contains_key(header::ACCEPT) {
        out.insert(header::VARY, HeaderValue::from_static("Accept"));
    }
    response
}

/// Map the request remainder onto a file under `root`.
///
/// Leading option segments (e.g. `300x200/`, `fit-in/`) are skipped by
/// trying successively shorter suffixes until one names an existing file.
fn resolve(root: &Path, rest: &str) -> Option<PathBuf> {
    let relative = Path::new(rest);
    if rest.is_empty() || !relative.components().all(|c| matches!(c, Component::Normal(_))) {
        return None;
    }
    let segments: Vec<&str> = rest.split('/').collect();
    (0..segments.len())
        .map(|skip| root.join(segments[skip..].join("/")))
        .find(|candidate| candidate.is_file())
}

fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn engine(dir: &Path, allow_unsafe: bool) -> Router {
        std::fs::write(dir.join("cat.png"), b"\x89PNG-cat").unwrap();
        std::fs::write(dir.join("notes.txt"), b"text").unwrap();
        let signer = UrlSigner::new("secret").unwrap();
        FsImageEngine::new(dir, allow_unsafe, Some(signer)).router()
    }

    async fn get(router: Router, uri: &str) -> Response {
        router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn healthcheck_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let response = get(engine(dir.path(), true), "/healthcheck").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn serves_unsafe_paths_with_cache_headers() {
        let dir = tempfile::tempdir().unwrap();
        let response = get(engine(dir.path(), true), "/unsafe/300x200/cat.png").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        assert_eq!(response.headers()[header::CACHE_CONTROL], CACHE_CONTROL);
        assert!(response.headers().contains_key(header::ETAG));
        assert!(response.headers().contains_key(header::EXPIRES));
        assert!(response.headers().contains_key(header::DATE));

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"\x89PNG-cat");
    }

    #[tokio::test]
    async fn unsafe_paths_rejected_when_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let response = get(engine(dir.path(), false), "/unsafe/cat.png").await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn signed_paths_verified() {
        let dir = tempfile::tempdir().unwrap();
        let router = engine(dir.path(), false);
        let signed = UrlSigner::new("secret").unwrap().signed_path("/cat.png");

        assert_eq!(get(router.clone(), &signed).await.status(), StatusCode::OK);
        assert_eq!(
            get(router, "/AAAAAAAAAAAAAAAAAAAAAAAAAAA=/cat.png").await.status(),
            StatusCode::FORBIDDEN
        );
    }

    #[tokio::test]
    async fn missing_and_traversal_paths_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let router = engine(dir.path(), true);
        assert_eq!(get(router.clone(), "/unsafe/dog.png").await.status(), StatusCode::NOT_FOUND);
        assert_eq!(get(router, "/unsafe/../etc/passwd").await.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn content_types_by_extension() {
        assert_eq!(content_type_for(Path::new("a.JPG")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("a.gif")), "image/gif");
        assert_eq!(content_type_for(Path::new("a.txt")), "application/octet-stream");
    }
}
