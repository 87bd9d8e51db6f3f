//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the image gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Background image service and local socket settings.
    pub server: ServerConfig,

    /// Request/response feature toggles (CORS, negotiation, rewrite).
    pub features: FeatureConfig,

    /// Persist-to-blob-store settings.
    pub persist: PersistConfig,

    /// URL signing settings.
    pub security: SecurityConfig,

    /// Response payload limits.
    pub limits: LimitConfig,

    /// Logging, metrics and usage reporting.
    pub observability: ObservabilityConfig,
}

/// Local image service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Unix socket the image service binds.
    pub socket_path: PathBuf,

    /// Liveness endpoint probed before every proxied request.
    pub health_path: String,

    /// Number of health probes before the service is declared unavailable.
    pub probe_attempts: u32,

    /// Pause between health probes in milliseconds.
    pub probe_interval_ms: u64,

    /// Per-probe deadline in milliseconds.
    pub probe_timeout_ms: u64,

    /// Deadline for the proxied image request in seconds.
    pub request_timeout_secs: u64,

    /// Largest upstream body buffered from the image service.
    pub max_response_bytes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from("/tmp/image-gateway.sock"),
            health_path: "/healthcheck".to_string(),
            probe_attempts: 10,
            probe_interval_ms: 30,
            probe_timeout_ms: 1000,
            request_timeout_secs: 30,
            max_response_bytes: 64 * 1024 * 1024,
        }
    }
}

/// Feature toggles applied while proxying.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Attach `Access-Control-Allow-Origin` to every envelope.
    pub enable_cors: bool,

    /// Value of the CORS header.
    pub cors_origin: Option<String>,

    /// Prefix paths with `/unsafe` instead of expecting a signed prefix.
    pub allow_unsafe_url: bool,

    /// Forward the client's `Accept` header and report `Vary`.
    pub auto_webp: bool,

    /// Run the path rewriter before forwarding.
    pub rewrite_enabled: bool,

    /// Prefix substitutions applied in order; first match wins.
    pub rewrite_rules: Vec<RewriteRuleConfig>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            enable_cors: false,
            cors_origin: None,
            allow_unsafe_url: true,
            auto_webp: false,
            rewrite_enabled: false,
            rewrite_rules: Vec::new(),
        }
    }
}

/// A single prefix substitution.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RewriteRuleConfig {
    pub from: String,
    pub to: String,
}

/// Persist path configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PersistConfig {
    /// Shared secret expected in `x-save-secret`.
    pub save_secret: Option<String>,

    /// Target bucket.
    pub save_bucket: Option<String>,

    /// Bucket used when `save_bucket` is unset.
    pub fallback_bucket: Option<String>,

    /// Root directory of the filesystem blob store used by the binary.
    pub store_root: PathBuf,
}

impl PersistConfig {
    /// Bucket objects are persisted into, if any is configured.
    pub fn bucket(&self) -> Option<&str> {
        self.save_bucket
            .as_deref()
            .filter(|b| !b.is_empty())
            .or_else(|| self.fallback_bucket.as_deref().filter(|b| !b.is_empty()))
    }
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self {
            save_secret: None,
            save_bucket: None,
            fallback_bucket: None,
            store_root: PathBuf::from("/tmp/image-gateway/store"),
        }
    }
}

/// URL signing configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SecurityConfig {
    /// HMAC key for signed image paths.
    pub security_key: Option<String>,
}

/// Response size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitConfig {
    /// Largest upstream body returned inline, in bytes.
    pub max_payload_bytes: u64,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: 6_000_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (DEBUG, INFO, WARNING, ERROR, CRITICAL).
    pub log_level: String,

    /// Send anonymous usage reports.
    pub send_anonymous_data: bool,

    /// Endpoint usage reports are posted to.
    pub usage_endpoint: Option<String>,

    /// Hard deadline for a single usage report in milliseconds.
    pub usage_timeout_ms: u64,

    /// Maximum usage reports in flight; extra reports are dropped.
    pub usage_max_in_flight: usize,

    /// Prometheus endpoint bind address.
    pub metrics_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "ERROR".to_string(),
            send_anonymous_data: false,
            usage_endpoint: None,
            usage_timeout_ms: 2000,
            usage_max_in_flight: 8,
            metrics_address: None,
        }
    }
}
