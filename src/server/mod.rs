//! Listener tasks
//!
//! One [`MockServer`] per enabled port, each running as its own task.
//! Listeners share only the read-only [`Dispatcher`].

pub mod listener;

#[cfg(test)]
mod tests;

pub use listener::MockServer;

use crate::config::ServerConfig;
use crate::dispatch::Dispatcher;
use crate::fixture::FixtureSource;
use crate::{MockError, Result};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info};

/// Binds every enabled listener and runs them until all have stopped
///
/// Fails without serving anything if no listener is enabled or any port
/// cannot be bound.
pub async fn run_listeners(config: ServerConfig) -> Result<()> {
    let dispatcher = Arc::new(Dispatcher::new(FixtureSource::new(&config.fixture_path)));

    let mut servers = Vec::new();
    for listener in config.enabled_listeners() {
        let server = MockServer::bind(&config, listener.port, dispatcher.clone()).await?;
        servers.push(server);
    }
    if servers.is_empty() {
        return Err(MockError::Config("No listener enabled".to_string()));
    }

    let mut tasks = JoinSet::new();
    for server in servers {
        info!(address = %server.local_addr()?, "Starting listener");
        tasks.spawn(server.run());
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined? {
            error!(error = %e, "Listener stopped with an error");
            return Err(e);
        }
    }

    info!("All listeners stopped");
    Ok(())
}
