// Port Layer - Interfaces for external dependencies

pub mod http_transport;
pub mod time_provider; // For deterministic testing

// Re-exports
pub use http_transport::{
    ApiRequest, ApiResponse, Attachment, HttpTransport, Method, TransportError,
};
pub use time_provider::TimeProvider;
