//! Persist-path decision table.
//!
//! | key header | secret header | secret matches | method | decision             |
//! |------------|---------------|----------------|--------|----------------------|
//! | absent     | -             | -              | -      | `Skip`               |
//! | present    | absent        | -              | -      | `Skip` (logged)      |
//! | present    | present       | no             | -      | `Reject`             |
//! | present    | present       | yes            | POST   | `PersistAndReturn`   |
//! | present    | present       | yes            | other  | `PersistAndContinue` |
//!
//! An empty header value counts as absent.

use crate::invocation::request::{HttpMethod, IncomingRequest};

pub const SAVE_KEY_HEADER: &str = "x-save-s3-key";
pub const SAVE_SECRET_HEADER: &str = "x-save-secret";

/// What to do with the upstream body before normal encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistDecision {
    /// Not requested, or requested without a secret.
    Skip,
    /// Secret mismatch. Terminal 404.
    Reject,
    /// Persist, then answer 201 with the stored size.
    PersistAndReturn { key: String },
    /// Persist as a side effect and still return the image.
    PersistAndContinue { key: String },
}

/// Classify `request` against the configured shared secret.
///
/// An unconfigured or empty secret never matches.
pub fn decide(request: &IncomingRequest, configured_secret: Option<&str>) -> PersistDecision {
    let Some(key) = non_empty(request.header(SAVE_KEY_HEADER)) else {
        return PersistDecision::Skip;
    };
    tracing::debug!(key = %key, "Persist requested");

    let Some(provided) = non_empty(request.header(SAVE_SECRET_HEADER)) else {
        tracing::error!("Missing mandatory x-save-secret header, persist skipped");
        return PersistDecision::Skip;
    };

    if non_empty(configured_secret) != Some(provided) {
        tracing::error!("Wrong x-save-secret, authentication failed");
        return PersistDecision::Reject;
    }

    let key = key.to_string();
    match request.method {
        HttpMethod::Post => PersistDecision::PersistAndReturn { key },
        _ => PersistDecision::PersistAndContinue { key },
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
