//! Image engines served by the background worker.
//!
//! The engine is an opaque collaborator: it supplies an axum [`Router`]
//! that answers the liveness endpoint and renders image paths. The
//! supervisor only ever talks to it over the local socket.

pub mod filesystem;

use axum::Router;

pub use filesystem::FsImageEngine;

/// Source of the router a worker serves on the local socket.
pub trait ImageEngine: Send + Sync + 'static {
    /// Build a fresh router; called once per worker launch.
    fn router(&self) -> Router;
}

impl ImageEngine for Router {
    fn router(&self) -> Router {
        self.clone()
    }
}
