//! HTTP/1.1 transport for the mock server
//!
//! This module provides request parsing, response serialization and the
//! `tokio_util` codec that frames both on a TCP stream.

pub mod codec;
pub mod request;
pub mod response;


pub use codec::{HttpProtocolError, RequestCodec};
pub use request::{IncomingRequest, QueryParams};
pub use response::{Encoding, ResponseSpec};
