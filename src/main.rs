use color_eyre::eyre::{Result, WrapErr};
use mocksrv::{ServerConfig, run_listeners};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("mocksrv=info")
        .init();

    let config = ServerConfig::default();
    let ports: Vec<u16> = config.enabled_listeners().map(|l| l.port).collect();
    info!(
        ?ports,
        fixture = %config.fixture_path.display(),
        "Starting mock server"
    );

    run_listeners(config)
        .await
        .wrap_err("Failed to run mock server")?;

    Ok(())
}
