// Batchline Infrastructure - HTTP Adapters
// Implements core::port::HttpTransport on top of reqwest

pub mod reqwest_transport;

pub use reqwest_transport::{ReqwestTransport, DEFAULT_REQUEST_TIMEOUT};
