//! The HTTP transport (C6), auth injector (C7), and request builder (C8)
//! that sit between the generic executor and a connector's vendor API.

pub mod auth;
pub mod builder;
pub mod transport;

pub use auth::{inject, substitute_placeholders, AuthError, AuthMutation};
pub use builder::{build, BodyFormat, BuiltRequest};
pub use transport::{HttpTransport, TransportError, TransportOutcome};
