use crate::http::codec::HttpProtocolError;
use thiserror::Error;

/// Error types for the mocksrv library
#[derive(Error, Debug)]
pub enum MockError {
    /// TCP-related errors (bind, accept, read, write)
    #[error("TCP error: {0}")]
    Tcp(#[from] std::io::Error),

    /// HTTP framing errors raised while reading a request
    #[error("HTTP error: {0}")]
    Http(#[from] HttpProtocolError),

    /// Response body could not be encoded
    #[error("Encoding error: {0}")]
    Encoding(std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Timeout errors
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// A listener task panicked or was cancelled
    #[error("Listener task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result type for the mocksrv library
pub type Result<T> = std::result::Result<T, MockError>;

pub mod config;
pub mod dispatch;
pub mod fixture;
pub mod http;
pub mod server;
pub mod test_utils;

// Re-export main types for convenience
pub use config::{ListenerConfig, ServerConfig};
pub use dispatch::{Dispatcher, Route, normalize_path};
pub use fixture::FixtureSource;
pub use crate::http::{Encoding, IncomingRequest, QueryParams, RequestCodec, ResponseSpec};
pub use server::{MockServer, run_listeners};
