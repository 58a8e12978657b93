use crate::http::codec::DEFAULT_MAX_BODY_SIZE;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Name of the fixture served for `/tapservice/api`, resolved against the
/// working directory.
pub const DEFAULT_FIXTURE: &str = "saltResponse.json";

/// A single listening port and whether a listener task is started for it
///
/// # Examples
///
/// ```
/// use mocksrv::ListenerConfig;
///
/// let listener = ListenerConfig::new(8080, true);
/// assert!(listener.enabled);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerConfig {
    /// TCP port to listen on
    pub port: u16,
    /// Whether a listener task is spawned for this port
    pub enabled: bool,
}

impl ListenerConfig {
    pub fn new(port: u16, enabled: bool) -> Self {
        Self { port, enabled }
    }
}

/// Configuration for the mock server
///
/// # Examples
///
/// ```
/// use mocksrv::{ListenerConfig, ServerConfig};
/// use std::time::Duration;
///
/// let config = ServerConfig {
///     listeners: vec![ListenerConfig::new(8080, true)],
///     read_timeout: Duration::from_secs(5),
///     ..Default::default()
/// };
/// assert_eq!(config.enabled_listeners().count(), 1);
/// ```
///
/// Using the default configuration:
///
/// ```
/// use mocksrv::ServerConfig;
///
/// let config = ServerConfig::default();
/// let ports: Vec<u16> = config.enabled_listeners().map(|l| l.port).collect();
/// assert_eq!(ports, vec![80]);
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address every listener binds on
    pub bind_ip: IpAddr,
    /// Ports to listen on
    pub listeners: Vec<ListenerConfig>,
    /// Fixture file served verbatim for the spoofed endpoint
    pub fixture_path: PathBuf,
    /// Buffer size for reading request data
    pub buffer_size: usize,
    /// Largest request body accepted; larger requests get `413`
    pub max_body_size: usize,
    /// Read timeout, also bounds how long an idle keep-alive connection is held
    pub read_timeout: Duration,
    /// Write timeout for responses
    pub write_timeout: Duration,
    /// Suppress the transport's default `Date`/`Server` headers
    pub raw_headers: bool,
}

impl ServerConfig {
    /// Listeners a task should be spawned for
    pub fn enabled_listeners(&self) -> impl Iterator<Item = &ListenerConfig> {
        self.listeners.iter().filter(|listener| listener.enabled)
    }

    /// Socket address for the given port on the configured bind ip
    pub fn bind_addr(&self, port: u16) -> SocketAddr {
        SocketAddr::new(self.bind_ip, port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            // 443 answers plain HTTP when enabled
            listeners: vec![ListenerConfig::new(80, true), ListenerConfig::new(443, false)],
            fixture_path: PathBuf::from(DEFAULT_FIXTURE),
            buffer_size: 8192,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
            raw_headers: true,
        }
    }
}
