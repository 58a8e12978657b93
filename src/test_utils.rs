//! Helpers for driving a live mock server in tests

use crate::config::{ListenerConfig, ServerConfig};
use crate::dispatch::Dispatcher;
use crate::fixture::FixtureSource;
use crate::http::HttpProtocolError;
use crate::server::MockServer;
use crate::{MockError, Result};
use bytes::BytesMut;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Configuration used by [`spawn_test_server`]: loopback, ephemeral port,
/// short timeouts
pub fn test_config(fixture_path: impl Into<PathBuf>) -> ServerConfig {
    ServerConfig {
        bind_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
        listeners: vec![ListenerConfig::new(0, true)],
        fixture_path: fixture_path.into(),
        read_timeout: Duration::from_secs(5),
        write_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

/// Starts a server on an ephemeral loopback port
///
/// Returns the server task, the address it listens on, and its shutdown
/// signal.
pub async fn spawn_test_server(
    config: ServerConfig,
) -> Result<(JoinHandle<Result<()>>, SocketAddr, broadcast::Sender<()>)> {
    let dispatcher = Arc::new(Dispatcher::new(FixtureSource::new(&config.fixture_path)));
    let server = MockServer::bind(&config, 0, dispatcher).await?;
    let addr = server.local_addr()?;
    let shutdown = server.shutdown_signal();

    let server_handle = tokio::spawn(server.run());
    Ok((server_handle, addr, shutdown))
}

/// A response as read off the wire
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Reads one `Content-Length`-framed response from `stream`
pub async fn read_response(stream: &mut TcpStream) -> Result<RawResponse> {
    let mut buffer = BytesMut::with_capacity(4096);

    loop {
        let mut headers = [httparse::EMPTY_HEADER; 32];
        let mut parsed = httparse::Response::new(&mut headers);
        let status = parsed
            .parse(&buffer)
            .map_err(|e| HttpProtocolError::HttpParse(e.to_string()))?;

        if let httparse::Status::Complete(head_len) = status {
            let headers: Vec<(String, String)> = parsed
                .headers
                .iter()
                .map(|h| (h.name.to_string(), String::from_utf8_lossy(h.value).into_owned()))
                .collect();
            let body_len = headers
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, v)| v.parse::<usize>().ok())
                .unwrap_or(0);

            if buffer.len() >= head_len + body_len {
                return Ok(RawResponse {
                    status: parsed.code.unwrap_or_default(),
                    reason: parsed.reason.unwrap_or_default().to_string(),
                    headers,
                    body: buffer[head_len..head_len + body_len].to_vec(),
                });
            }
        }

        buffer.reserve(4096);
        if stream.read_buf(&mut buffer).await? == 0 {
            return Err(MockError::Http(HttpProtocolError::IncompleteRequest));
        }
    }
}

/// Connects, writes `request` verbatim and reads back one response
pub async fn send_raw_request(addr: SocketAddr, request: &[u8]) -> Result<RawResponse> {
    let mut stream = TcpStream::connect(addr).await?;
    stream.write_all(request).await?;
    stream.flush().await?;
    read_response(&mut stream).await
}

/// Builds a POST request for `target` with an optional body
pub fn post_request(target: &str, body: Option<&str>) -> Vec<u8> {
    match body {
        Some(body) => format!(
            "POST {target} HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        )
        .into_bytes(),
        None => format!("POST {target} HTTP/1.1\r\nHost: localhost\r\n\r\n").into_bytes(),
    }
}
