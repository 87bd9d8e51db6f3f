//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize logging and the metrics exporter from configuration
//! - Build the image engine and the invocation handler
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The image worker is not started here; the first invocation launches it

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::config::{ConfigError, GatewayConfig, ObservabilityConfig};
use crate::engine::{FsImageEngine, ImageEngine};
use crate::invocation::InvocationHandler;
use crate::observability::{logging, metrics};
use crate::proxy::UrlSigner;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid metrics address: {0}")]
    InvalidMetricsAddress(String),

    #[error("invalid security key")]
    InvalidSecurityKey,

    #[error("image root is not a directory: {0}")]
    ImageRoot(PathBuf),
}

/// Install the tracing subscriber and, when configured, the metrics endpoint.
pub fn init_observability(config: &ObservabilityConfig) -> Result<(), StartupError> {
    logging::init_logging(&config.log_level);

    if let Some(raw) = &config.metrics_address {
        let addr: SocketAddr = raw
            .parse()
            .map_err(|_| StartupError::InvalidMetricsAddress(raw.clone()))?;
        metrics::init_metrics(addr);
    }
    Ok(())
}

/// Filesystem engine over `images_root`, verifying signed paths when a
/// security key is configured.
pub fn build_engine(config: &GatewayConfig, images_root: &Path) -> Result<FsImageEngine, StartupError> {
    if !images_root.is_dir() {
        return Err(StartupError::ImageRoot(images_root.to_path_buf()));
    }

    let signer = config
        .security
        .security_key
        .as_deref()
        .map(UrlSigner::new)
        .transpose()
        .map_err(|_| StartupError::InvalidSecurityKey)?;

    tracing::info!(
        root = %images_root.display(),
        allow_unsafe = config.features.allow_unsafe_url,
        signed = signer.is_some(),
        "Image engine configured"
    );
    Ok(FsImageEngine::new(images_root, config.features.allow_unsafe_url, signer))
}

pub fn build_handler(config: GatewayConfig, engine: Arc<dyn ImageEngine>) -> InvocationHandler {
    InvocationHandler::builder(config, engine).build()
}
