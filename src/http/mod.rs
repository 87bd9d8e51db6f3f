//! HTTP front subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → request.rs (HTTP request → InvocationEvent)
//!     → InvocationHandler
//!     → response.rs (ResponseEnvelope → HTTP response)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{event_from_parts, X_REQUEST_ID};
pub use response::render;
pub use server::GatewayServer;
