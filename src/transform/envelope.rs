//! Response envelope formatting.
//!
//! # Responsibilities
//! - Assemble the header mapping (`Content-Type` always present)
//! - Attach the CORS header when enabled
//! - Serialize error bodies as JSON; pass encoded image bodies through
//!
//! # Design Decisions
//! - Pure formatting: never fails, always returns a well-formed envelope
//! - Status code and the base64 flag serialize as strings on the wire

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::FeatureConfig;

pub const DEFAULT_CACHE_CONTROL: &str = "max-age=120,public";
pub const NO_CACHE: &str = "no-cache,no-store";
pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const GENERIC_ERROR_MESSAGE: &str = "error, please check logs";

/// Final structured response returned at the invocation boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    #[serde(with = "string_status")]
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    #[serde(with = "string_flag")]
    pub is_base64_encoded: bool,
}

impl ResponseEnvelope {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// Cache-related headers carried through from the upstream response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheHeaders {
    pub cache_control: Option<String>,
    pub expires: Option<String>,
    pub etag: Option<String>,
    pub date: Option<String>,
    pub vary: Option<String>,
}

/// Builds envelopes according to the configured CORS policy.
#[derive(Debug, Clone, Default)]
pub struct EnvelopeBuilder {
    cors_origin: Option<String>,
}

impl EnvelopeBuilder {
    /// `cors_origin` is `Some` only when CORS is enabled.
    pub fn new(cors_origin: Option<String>) -> Self {
        Self { cors_origin }
    }

    pub fn from_config(features: &FeatureConfig) -> Self {
        let origin = if features.enable_cors {
            Some(features.cors_origin.clone().unwrap_or_default())
        } else {
            None
        };
        Self::new(origin)
    }

    /// Generic error envelope with the default cache policy.
    pub fn error(&self, status: u16) -> ResponseEnvelope {
        self.json(status, &json!({ "message": GENERIC_ERROR_MESSAGE }), DEFAULT_CACHE_CONTROL)
    }

    pub fn error_with_message(&self, status: u16, message: &str) -> ResponseEnvelope {
        self.json(status, &json!({ "message": message }), DEFAULT_CACHE_CONTROL)
    }

    pub fn error_with_cache_control(&self, status: u16, cache_control: &str) -> ResponseEnvelope {
        self.json(status, &json!({ "message": GENERIC_ERROR_MESSAGE }), cache_control)
    }

    /// Non-200 envelope with an arbitrary JSON body.
    pub fn json(&self, status: u16, body: &serde_json::Value, cache_control: &str) -> ResponseEnvelope {
        let mut headers = self.base_headers(JSON_CONTENT_TYPE);
        headers.insert("Cache-Control".to_string(), cache_control.to_string());
        ResponseEnvelope {
            status_code: status,
            headers,
            body: body.to_string(),
            is_base64_encoded: false,
        }
    }

    /// Successful image envelope; `encoded_body` is already base64.
    pub fn image(&self, encoded_body: String, content_type: &str, cache: CacheHeaders) -> ResponseEnvelope {
        let mut headers = self.base_headers(content_type);
        let carried = [
            ("Expires", cache.expires),
            ("Etag", cache.etag),
            ("Cache-Control", cache.cache_control),
            ("Date", cache.date),
            ("Vary", cache.vary),
        ];
        for (name, value) in carried {
            if let Some(value) = value {
                headers.insert(name.to_string(), value);
            }
        }

        let envelope = ResponseEnvelope {
            status_code: 200,
            headers,
            body: encoded_body,
            is_base64_encoded: true,
        };
        tracing::debug!(status = envelope.status_code, headers = ?envelope.headers, "Envelope built");
        envelope
    }

    fn base_headers(&self, content_type: &str) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), content_type.to_string());
        if let Some(origin) = &self.cors_origin {
            headers.insert("Access-Control-Allow-Origin".to_string(), origin.clone());
        }
        headers
    }
}

mod string_status {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(status: &u16, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&status.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

mod string_flag {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(flag: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if *flag { "true" } else { "false" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match String::deserialize(deserializer)?.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(D::Error::custom(format!("invalid base64 flag: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_envelope_shape() {
        let envelope = EnvelopeBuilder::new(None).error(502);
        assert_eq!(envelope.status_code, 502);
        assert!(!envelope.is_base64_encoded);
        assert_eq!(envelope.header("Content-Type"), Some(JSON_CONTENT_TYPE));
        assert_eq!(envelope.header("Cache-Control"), Some(DEFAULT_CACHE_CONTROL));
        assert_eq!(envelope.header("Access-Control-Allow-Origin"), None);
        assert_eq!(envelope.body, r#"{"message":"error, please check logs"}"#);
    }

    #[test]
    fn cors_header_only_when_enabled() {
        let enabled = EnvelopeBuilder::new(Some("https://example.com".into()));
        assert_eq!(
            enabled.error(404).header("Access-Control-Allow-Origin"),
            Some("https://example.com")
        );
        let image = enabled.image("AAAA".into(), "image/png", CacheHeaders::default());
        assert_eq!(image.header("Access-Control-Allow-Origin"), Some("https://example.com"));

        let mut features = FeatureConfig::default();
        features.enable_cors = false;
        features.cors_origin = Some("https://example.com".into());
        let disabled = EnvelopeBuilder::from_config(&features);
        assert_eq!(disabled.error(404).header("Access-Control-Allow-Origin"), None);
    }

    #[test]
    fn image_envelope_carries_cache_headers() {
        let cache = CacheHeaders {
            cache_control: Some("max-age=31536000,public".into()),
            expires: Some("Wed, 21 Oct 2026 07:28:00 GMT".into()),
            etag: Some("\"abc\"".into()),
            date: Some("Tue, 20 Oct 2026 07:28:00 GMT".into()),
            vary: Some("Accept".into()),
        };
        let envelope = EnvelopeBuilder::default().image("aGVsbG8=".into(), "image/jpeg", cache);
        assert_eq!(envelope.status_code, 200);
        assert!(envelope.is_base64_encoded);
        assert_eq!(envelope.body, "aGVsbG8=");
        assert_eq!(envelope.header("Content-Type"), Some("image/jpeg"));
        assert_eq!(envelope.header("Cache-Control"), Some("max-age=31536000,public"));
        assert_eq!(envelope.header("Etag"), Some("\"abc\""));
        assert_eq!(envelope.header("Vary"), Some("Accept"));
    }

    #[test]
    fn serializes_status_and_flag_as_strings() {
        let envelope = EnvelopeBuilder::default().image("AAAA".into(), "image/gif", CacheHeaders::default());
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["statusCode"], "200");
        assert_eq!(value["isBase64Encoded"], "true");
        assert_eq!(value["headers"]["Content-Type"], "image/gif");

        let parsed: ResponseEnvelope = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, envelope);
    }
}
