//! HTTP transport: one POST per attempt, bounded by the client timeout.

pub mod http;

pub use http::{HttpTransport, TransportError};
