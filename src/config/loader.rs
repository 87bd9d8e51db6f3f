//! Configuration loading from disk and the environment.
//!
//! Precedence: defaults, then the optional TOML file, then environment
//! variables. Validation runs once on the merged result.

use std::path::{Path, PathBuf};
use std::fs;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};
use crate::observability::logging::normalize_log_level;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load the optional file, overlay the process environment and validate.
pub fn load(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    load_with(path, |key| std::env::var(key).ok())
}

/// Same as [`load`], reading overrides from `lookup` instead of the process
/// environment.
pub fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => GatewayConfig::default(),
    };
    apply_env_overrides(&mut config, lookup)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    tracing::debug!(
        socket_path = %config.server.socket_path.display(),
        cors = config.features.enable_cors,
        auto_webp = config.features.auto_webp,
        rewrite = config.features.rewrite_enabled,
        "Configuration loaded"
    );
    Ok(config)
}

/// Overlay recognised environment variables onto `config`.
///
/// `lookup` abstracts the environment so callers (and tests) can supply
/// their own source.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup("ENABLE_CORS") {
        config.features.enable_cors = is_yes(&value);
    }
    if let Some(value) = lookup("CORS_ORIGIN") {
        config.features.cors_origin = Some(value);
    }
    if let Some(value) = lookup("ALLOW_UNSAFE_URL") {
        config.features.allow_unsafe_url = parse_bool("ALLOW_UNSAFE_URL", &value)?;
    }
    if let Some(value) = lookup("AUTO_WEBP") {
        config.features.auto_webp = parse_bool("AUTO_WEBP", &value)?;
    }
    if let Some(value) = lookup("REWRITE_ENABLED") {
        config.features.rewrite_enabled = is_yes(&value);
    }
    if let Some(value) = lookup("S3_SAVE_SECRET") {
        config.persist.save_secret = Some(value);
    }
    if let Some(value) = lookup("S3_SAVE_BUCKET") {
        config.persist.save_bucket = Some(value);
    }
    if let Some(value) = lookup("TC_AWS_LOADER_BUCKET") {
        config.persist.fallback_bucket = Some(value);
    }
    if let Some(value) = lookup("SECURITY_KEY") {
        config.security.security_key = Some(value);
    }
    if let Some(value) = lookup("SEND_ANONYMOUS_DATA") {
        config.observability.send_anonymous_data = is_yes(&value);
    }
    if let Some(value) = lookup("USAGE_ENDPOINT") {
        config.observability.usage_endpoint = Some(value);
    }
    if let Some(value) = lookup("METRICS_ADDRESS") {
        config.observability.metrics_address = Some(value);
    }
    if let Some(value) = lookup("IMAGE_SOCKET_PATH") {
        config.server.socket_path = PathBuf::from(value);
    }

    let level = lookup("LOG_LEVEL").unwrap_or_else(|| config.observability.log_level.clone());
    config.observability.log_level = normalize_log_level(&level).to_string();

    Ok(())
}

/// `YES` switches, compared case-insensitively.
fn is_yes(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("yes")
}

/// Boolean switches in the usual truthy/falsy spellings.
fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "t" | "true" | "on" | "1" => Ok(true),
        "n" | "no" | "f" | "false" | "off" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn env_overrides_features() {
        let mut config = GatewayConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("ENABLE_CORS", "yes"),
                ("CORS_ORIGIN", "https://example.com"),
                ("ALLOW_UNSAFE_URL", "False"),
                ("AUTO_WEBP", "on"),
                ("REWRITE_ENABLED", "NO"),
                ("S3_SAVE_SECRET", "s3cret"),
                ("TC_AWS_LOADER_BUCKET", "loader"),
                ("SEND_ANONYMOUS_DATA", "YES"),
            ]),
        )
        .unwrap();

        assert!(config.features.enable_cors);
        assert_eq!(config.features.cors_origin.as_deref(), Some("https://example.com"));
        assert!(!config.features.allow_unsafe_url);
        assert!(config.features.auto_webp);
        assert!(!config.features.rewrite_enabled);
        assert_eq!(config.persist.save_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.persist.bucket(), Some("loader"));
        assert!(config.observability.send_anonymous_data);
    }

    #[test]
    fn invalid_log_level_defaults_to_error() {
        let mut config = GatewayConfig::default();
        apply_env_overrides(&mut config, env(&[("LOG_LEVEL", "verbose")])).unwrap();
        assert_eq!(config.observability.log_level, "ERROR");

        apply_env_overrides(&mut config, env(&[("LOG_LEVEL", "warning")])).unwrap();
        assert_eq!(config.observability.log_level, "WARNING");
    }

    #[test]
    fn rejects_unparseable_bool() {
        let mut config = GatewayConfig::default();
        let err = apply_env_overrides(&mut config, env(&[("AUTO_WEBP", "maybe")])).unwrap_err();
        assert!(err.to_string().contains("AUTO_WEBP"));
    }

    #[test]
    fn loads_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[server]\nsocket_path = \"/tmp/test.sock\"\nprobe_attempts = 3\n\n[persist]\nsave_bucket = \"images\""
        )
        .unwrap();

        let config = load_with(Some(file.path()), |_| None).unwrap();
        assert_eq!(config.server.probe_attempts, 3);
        assert_eq!(config.persist.bucket(), Some("images"));
    }

    #[test]
    fn environment_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[persist]\nsave_bucket = \"images\"").unwrap();

        let config = load_with(Some(file.path()), env(&[("S3_SAVE_BUCKET", "other")])).unwrap();
        assert_eq!(config.persist.bucket(), Some("other"));
    }

    #[test]
    fn load_reports_validation_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nprobe_attempts = 0").unwrap();

        match load_with(Some(file.path()), |_| None) {
            Err(ConfigError::Validation(errors)) => {
                assert_eq!(errors, vec![ValidationError::NoProbeAttempts]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
