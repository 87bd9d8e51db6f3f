//! Invocation boundary.
//!
//! # Data Flow
//! ```text
//! InvocationEvent
//!     → request.rs (method validation → IncomingRequest)
//!     → handler.rs
//!         → Supervisor::acquire_session
//!         → RequestProxy::forward
//!         → ResponseTransformer::process
//!     → ResponseEnvelope
//! ```

pub mod handler;
pub mod request;

pub use handler::{InvocationHandler, InvocationHandlerBuilder};
pub use request::{HttpMethod, IncomingRequest, InvocationEvent, RequestContext};
