use crate::config::ServerConfig;
use crate::dispatch::Dispatcher;
use crate::http::{HttpProtocolError, RequestCodec, ResponseSpec};
use crate::{MockError, Result};
use bytes::BytesMut;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::{signal, time::timeout};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, error, info, warn, Instrument};

const ACCEPT_BACKOFF_BASE: Duration = Duration::from_millis(10);
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Delay before retrying after `failures` consecutive accept errors
pub(crate) fn accept_backoff(failures: u32) -> Duration {
    ACCEPT_BACKOFF_BASE
        .saturating_mul(1u32 << failures.min(16))
        .min(ACCEPT_BACKOFF_MAX)
}

/// A mock HTTP server bound to a single port
///
/// Connections are served one at a time: a connection is handled to
/// completion, keep-alive requests included, before the next one is accepted.
///
/// # Examples
///
/// ```no_run
/// use mocksrv::{Dispatcher, FixtureSource, MockServer, ServerConfig};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = ServerConfig::default();
///     let dispatcher = Arc::new(Dispatcher::new(FixtureSource::new(&config.fixture_path)));
///     let server = MockServer::bind(&config, 8080, dispatcher).await?;
///     let shutdown_signal = server.shutdown_signal();
///
///     let server_handle = tokio::spawn(server.run());
///
///     // Do other work...
///
///     let _ = shutdown_signal.send(());
///     server_handle.await??;
///     Ok(())
/// }
/// ```
pub struct MockServer {
    listener: TcpListener,
    config: ServerConfig,
    dispatcher: Arc<Dispatcher>,
    shutdown_signal: Arc<tokio::sync::broadcast::Sender<()>>,
    shutdown_rx: tokio::sync::broadcast::Receiver<()>,
}

impl MockServer {
    /// Binds `port` on the configured address; port 0 picks a free port
    pub async fn bind(config: &ServerConfig, port: u16, dispatcher: Arc<Dispatcher>) -> Result<Self> {
        let addr = config.bind_addr(port);
        let listener = TcpListener::bind(addr).await?;
        let (shutdown_signal, shutdown_rx) = tokio::sync::broadcast::channel(1);
        Ok(Self {
            listener,
            config: config.clone(),
            dispatcher,
            shutdown_signal: Arc::new(shutdown_signal),
            shutdown_rx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Returns a shutdown signal sender that can be used to gracefully shutdown the server
    pub fn shutdown_signal(&self) -> tokio::sync::broadcast::Sender<()> {
        self.shutdown_signal.as_ref().clone()
    }

    /// Accepts and serves connections until Ctrl-C or an internal shutdown signal
    pub async fn run(self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Accepts and serves connections until `stop` completes or an internal
    /// shutdown signal arrives
    ///
    /// `stop` is polled while a connection is being served too, so a stop
    /// request is never lost to a long-lived keep-alive client.
    pub async fn run_until<F>(mut self, stop: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let address = self.local_addr()?;
        info!(%address, "Mock server listening");

        tokio::pin!(stop);
        let mut accept_failures = 0u32;

        loop {
            let (stream, addr) = tokio::select! {
                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok(accepted) => {
                            accept_failures = 0;
                            accepted
                        }
                        Err(e) => {
                            let delay = accept_backoff(accept_failures);
                            accept_failures = accept_failures.saturating_add(1);
                            error!(error = %e, ?delay, "Failed to accept connection");
                            tokio::time::sleep(delay).await;
                            continue;
                        }
                    }
                }
                _ = &mut stop => {
                    info!("Received shutdown signal, stopping server");
                    break;
                }
                _ = self.shutdown_rx.recv() => {
                    info!("Received internal shutdown signal, stopping server");
                    break;
                }
            };

            info!(%addr, "Accepted connection");
            let span = tracing::info_span!("connection", %addr);
            let connection = Self::handle_connection(stream, addr, &self.config, &self.dispatcher)
                .instrument(span);

            tokio::select! {
                result = connection => {
                    if let Err(e) = result {
                        error!(%addr, error = %e, "Error handling connection");
                    }
                    info!(%addr, "Connection closed");
                }
                _ = &mut stop => {
                    info!(%addr, "Received shutdown signal, dropping connection");
                    break;
                }
                _ = self.shutdown_rx.recv() => {
                    info!(%addr, "Received internal shutdown signal, dropping connection");
                    break;
                }
            }
        }

        info!(%address, "Mock server stopped");
        Ok(())
    }

    /// Serves every request on one connection until the client closes it,
    /// asks for `Connection: close`, or stays idle past the read timeout
    async fn handle_connection(
        mut stream: TcpStream,
        addr: SocketAddr,
        config: &ServerConfig,
        dispatcher: &Dispatcher,
    ) -> Result<()> {
        let mut codec = RequestCodec::new(config.raw_headers).with_max_body_size(config.max_body_size);
        let mut buffer = BytesMut::with_capacity(config.buffer_size);
        let mut out = BytesMut::new();

        loop {
            let request = match codec.decode(&mut buffer) {
                Ok(Some(request)) => request.with_peer(addr),
                Ok(None) => {
                    buffer.reserve(config.buffer_size);
                    match timeout(config.read_timeout, stream.read_buf(&mut buffer)).await {
                        Ok(Ok(0)) => {
                            if buffer.is_empty() && !codec.is_mid_request() {
                                info!(%addr, "Client closed connection");
                                return Ok(());
                            }
                            return Err(HttpProtocolError::IncompleteRequest.into());
                        }
                        Ok(Ok(n)) => {
                            debug!(%addr, size = n, "Received data");
                            continue;
                        }
                        Ok(Err(e)) => return Err(e.into()),
                        Err(_) => {
                            warn!(%addr, "Read timeout");
                            return Ok(());
                        }
                    }
                }
                Err(e) => {
                    warn!(%addr, error = %e, "Malformed request");
                    out.clear();
                    codec.encode(ResponseSpec::error(e.status(), SystemTime::now()), &mut out)?;
                    Self::write_response(&mut stream, &out, config).await?;
                    return Err(e.into());
                }
            };

            let close = request.wants_close();
            let response = dispatcher.handle(&request).await?;
            let status = response.status;

            out.clear();
            codec.encode(response, &mut out)?;
            Self::write_response(&mut stream, &out, config).await?;
            info!(%addr, status = status.as_u16(), size = out.len(), "Response sent");

            if close {
                return Ok(());
            }
        }
    }

    async fn write_response(stream: &mut TcpStream, data: &[u8], config: &ServerConfig) -> Result<()> {
        timeout(config.write_timeout, stream.write_all(data))
            .await
            .map_err(|_| MockError::Timeout("Write timeout".to_string()))??;
        stream.flush().await?;
        Ok(())
    }
}
