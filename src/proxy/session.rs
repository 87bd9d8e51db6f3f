//! HTTP/1.1 client session over the local Unix socket.
//!
//! # Responsibilities
//! - Connect to the image service socket and perform the HTTP handshake
//! - Reuse the established connection across requests (probe, then forward)
//! - Buffer upstream responses into an immutable [`UpstreamResponse`]
//!
//! # Design Decisions
//! - One connection per session; reconnect transparently if it was closed
//! - Optional deadline covers send + full body read
//! - Optional body limit stops buffering once the upstream body exceeds it

use std::path::{Path, PathBuf};
use std::pin::pin;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request};
use bytes::{Bytes, BytesMut};
use hyper::body::{Body as _, Incoming};
use hyper::client::conn::http1::{self, SendRequest};
use hyper_util::rt::TokioIo;
use tokio::net::UnixStream;

use crate::error::GatewayError;

/// Buffered response from the image service.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl UpstreamResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn content_type(&self) -> &str {
        self.header("content-type").unwrap_or("")
    }

    /// Declared content length, or the buffered body length when absent.
    pub fn content_length(&self) -> u64 {
        self.header("content-length")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(self.body.len() as u64)
    }
}

/// Live connection to the image service.
pub struct UpstreamSession {
    socket_path: PathBuf,
    sender: Option<SendRequest<Body>>,
    timeout: Option<Duration>,
    body_limit: Option<u64>,
}

impl UpstreamSession {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            sender: None,
            timeout: None,
            body_limit: None,
        }
    }

    /// Bound every request issued through this session.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// Refuse upstream bodies larger than `limit` bytes with `PayloadTooLarge`.
    pub fn set_body_limit(&mut self, limit: Option<u64>) {
        self.body_limit = limit;
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    async fn connect(&self) -> Result<SendRequest<Body>, GatewayError> {
        let stream = UnixStream::connect(&self.socket_path).await?;
        let (sender, connection) = http1::handshake(TokioIo::new(stream)).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::debug!(error = %e, "Upstream connection closed with error");
            }
        });
        Ok(sender)
    }

    /// Issue a GET for `path` with the given extra headers.
    pub async fn get(&mut self, path: &str, headers: &[(String, String)]) -> Result<UpstreamResponse, GatewayError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.send(path, headers))
                .await
                .map_err(|_| GatewayError::Timeout)?,
            None => self.send(path, headers).await,
        }
    }

    async fn send(&mut self, path: &str, headers: &[(String, String)]) -> Result<UpstreamResponse, GatewayError> {
        let mut sender = match self.sender.take() {
            Some(sender) => sender,
            None => self.connect().await?,
        };
        if sender.ready().await.is_err() {
            tracing::debug!(socket = %self.socket_path.display(), "Upstream connection stale, reconnecting");
            sender = self.connect().await?;
        }

        let mut builder = Request::builder()
            .method(Method::GET)
            .uri(path)
            .header(header::HOST, "localhost");
        for (name, value) in headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let request = builder.body(Body::empty())?;

        let response = sender.send_request(request).await?;
        let (parts, incoming) = response.into_parts();
        if let Some(limit) = self.body_limit {
            let declared = parts
                .headers
                .get(header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            if let Some(declared) = declared.filter(|len| *len > limit) {
                return Err(GatewayError::PayloadTooLarge(declared));
            }
        }
        let body = read_body(incoming, self.body_limit).await?;

        self.sender = Some(sender);
        Ok(UpstreamResponse {
            status: parts.status.as_u16(),
            headers: parts.headers,
            body,
        })
    }
}

async fn read_body(incoming: Incoming, limit: Option<u64>) -> Result<Bytes, GatewayError> {
    let mut incoming = pin!(incoming);
    let mut buf = BytesMut::new();
    while let Some(frame) = std::future::poll_fn(|cx| incoming.as_mut().poll_frame(cx)).await {
        let Ok(data) = frame?.into_data() else {
            continue;
        };
        let total = (buf.len() + data.len()) as u64;
        if limit.is_some_and(|limit| total > limit) {
            return Err(GatewayError::PayloadTooLarge(total));
        }
        buf.extend_from_slice(&data);
    }
    Ok(buf.freeze())
}

impl std::fmt::Debug for UpstreamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamSession")
            .field("socket_path", &self.socket_path)
            .field("connected", &self.sender.is_some())
            .field("timeout", &self.timeout)
            .field("body_limit", &self.body_limit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn response(headers: &[(&'static str, &'static str)], body: &'static [u8]) -> UpstreamResponse {
        let mut map = HeaderMap::new();
        for (k, v) in headers {
            map.insert(*k, HeaderValue::from_static(v));
        }
        UpstreamResponse {
            status: 200,
            headers: map,
            body: Bytes::from_static(body),
        }
    }

    #[test]
    fn content_length_prefers_header() {
        let declared = response(&[("content-length", "7000000")], b"abc");
        assert_eq!(declared.content_length(), 7_000_000);

        let missing = response(&[], b"abcd");
        assert_eq!(missing.content_length(), 4);

        let garbage = response(&[("content-length", "lots")], b"ab");
        assert_eq!(garbage.content_length(), 2);
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let upstream = response(&[("content-type", "image/png")], b"");
        assert_eq!(upstream.header("Content-Type"), Some("image/png"));
        assert_eq!(upstream.content_type(), "image/png");
    }

    #[tokio::test]
    async fn missing_socket_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = UpstreamSession::new(dir.path().join("absent.sock"));
        let err = session.get("/healthcheck", &[]).await.unwrap_err();
        assert!(matches!(err, GatewayError::Io(_)));
    }
}
