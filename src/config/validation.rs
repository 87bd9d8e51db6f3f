//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (probe attempts > 0, payload limit > 0)
//! - Check dependent settings (CORS origin when CORS is enabled)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>

use thiserror::Error;

use crate::config::schema::GatewayConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("server.socket_path must not be empty")]
    EmptySocketPath,
    #[error("server.health_path must start with '/': {0}")]
    InvalidHealthPath(String),
    #[error("server.probe_attempts must be at least 1")]
    NoProbeAttempts,
    #[error("features.cors_origin is required when CORS is enabled")]
    MissingCorsOrigin,
    #[error("limits.max_payload_bytes must be greater than 0")]
    ZeroPayloadLimit,
    #[error("server.max_response_bytes must be at least limits.max_payload_bytes")]
    ResponseLimitBelowPayload,
    #[error("rewrite rule prefixes must start with '/': {0}")]
    InvalidRewriteRule(String),
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.socket_path.as_os_str().is_empty() {
        errors.push(ValidationError::EmptySocketPath);
    }
    if !config.server.health_path.starts_with('/') {
        errors.push(ValidationError::InvalidHealthPath(config.server.health_path.clone()));
    }
    if config.server.probe_attempts == 0 {
        errors.push(ValidationError::NoProbeAttempts);
    }
    if config.features.enable_cors
        && config.features.cors_origin.as_deref().map_or(true, str::is_empty)
    {
        errors.push(ValidationError::MissingCorsOrigin);
    }
    if config.limits.max_payload_bytes == 0 {
        errors.push(ValidationError::ZeroPayloadLimit);
    }
    if config.server.max_response_bytes < config.limits.max_payload_bytes {
        errors.push(ValidationError::ResponseLimitBelowPayload);
    }
    for rule in &config.features.rewrite_rules {
        if !rule.from.starts_with('/') || !rule.to.starts_with('/') {
            errors.push(ValidationError::InvalidRewriteRule(format!("{} -> {}", rule.from, rule.to)));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::RewriteRuleConfig;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&GatewayConfig::default()), Ok(()));
    }

    #[test]
    fn collects_every_error() {
        let mut config = GatewayConfig::default();
        config.server.probe_attempts = 0;
        config.server.health_path = "healthcheck".into();
        config.features.enable_cors = true;
        config.limits.max_payload_bytes = 0;
        config.features.rewrite_rules.push(RewriteRuleConfig {
            from: "img".into(),
            to: "/x".into(),
        });

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 5);
        assert!(errors.contains(&ValidationError::NoProbeAttempts));
        assert!(errors.contains(&ValidationError::MissingCorsOrigin));
    }

    #[test]
    fn response_limit_must_cover_payload_limit() {
        let mut config = GatewayConfig::default();
        config.server.max_response_bytes = config.limits.max_payload_bytes - 1;
        assert_eq!(validate_config(&config), Err(vec![ValidationError::ResponseLimitBelowPayload]));
    }
}
