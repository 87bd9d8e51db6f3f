//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Map the `LOG_LEVEL` vocabulary onto tracing levels
//!
//! # Design Decisions
//! - `RUST_LOG` wins when set; otherwise the configured level applies
//! - Unknown levels fall back to ERROR

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LEVELS: [&str; 5] = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"];

/// Canonical upper-case level name; anything unrecognised becomes `ERROR`.
pub fn normalize_log_level(raw: &str) -> &'static str {
    let upper = raw.trim().to_ascii_uppercase();
    LEVELS
        .iter()
        .copied()
        .find(|level| *level == upper)
        .unwrap_or("ERROR")
}

pub fn level_filter(raw: &str) -> LevelFilter {
    match normalize_log_level(raw) {
        "DEBUG" => LevelFilter::DEBUG,
        "INFO" => LevelFilter::INFO,
        "WARNING" => LevelFilter::WARN,
        _ => LevelFilter::ERROR,
    }
}

/// Install the global subscriber. Safe to call more than once.
pub fn init_logging(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::builder()
            .with_default_directive(level_filter(log_level).into())
            .parse_lossy("")
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
