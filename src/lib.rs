//! Image gateway library.
//!
//! Supervises a local image service reachable over a Unix socket, proxies
//! invocations to it and shapes the responses into size-limited envelopes,
//! optionally persisting rendered images to a blob store.

// Invocation pipeline
pub mod invocation;
pub mod proxy;
pub mod supervisor;
pub mod transform;

// Collaborators
pub mod engine;
pub mod storage;

// Infrastructure
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use invocation::{InvocationEvent, InvocationHandler};
pub use lifecycle::Shutdown;
pub use supervisor::{Supervisor, WorkerState};
pub use transform::ResponseEnvelope;
