//! Path rewriting.
//!
//! # Design Decisions
//! - Rewriters are pure functions from path to path
//! - A failed rewrite is never fatal; the caller keeps the original path
//! - Prefix rules are checked in order, first match wins (O(n), no regex)

use thiserror::Error;

use crate::config::RewriteRuleConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RewriteError {
    #[error("path must start with '/': {0}")]
    RelativePath(String),
}

/// Maps an incoming path onto the path the image service understands.
pub trait PathRewriter: Send + Sync + std::fmt::Debug {
    fn rewrite(&self, path: &str) -> Result<String, RewriteError>;
}

/// Leaves every path untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRewrite;

impl PathRewriter for NoRewrite {
    fn rewrite(&self, path: &str) -> Result<String, RewriteError> {
        Ok(path.to_string())
    }
}

/// Replaces a matching path prefix.
#[derive(Debug, Clone, Default)]
pub struct PrefixRewriter {
    rules: Vec<RewriteRuleConfig>,
}

impl PrefixRewriter {
    pub fn new(rules: Vec<RewriteRuleConfig>) -> Self {
        Self { rules }
    }
}

impl PathRewriter for PrefixRewriter {
    fn rewrite(&self, path: &str) -> Result<String, RewriteError> {
        if !path.starts_with('/') {
            return Err(RewriteError::RelativePath(path.to_string()));
        }
        let rewritten = self
            .rules
            .iter()
            .find_map(|rule| {
                path.strip_prefix(rule.from.as_str())
                    .map(|rest| format!("{}{}", rule.to, rest))
            })
            .unwrap_or_else(|| path.to_string());
        Ok(rewritten)
    }
}
