// Batchline Core - Domain Logic, Ports & Worker Pool
// NO HTTP client dependency: transports are injected through ports

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

pub use error::{AppError, Result};
