use fleet_server::{server, FleetService, ServerConfig};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env()?;

    // RUST_LOG takes precedence over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    info!("Fleet server starting");
    info!("  listen address: {}", config.listen_addr);
    info!(
        "  actions: start delay {}ms, duration {}ms",
        config.action_start_delay_ms, config.action_duration_ms
    );

    let mut service = FleetService::start(&config);
    let listener = TcpListener::bind(&config.listen_addr).await?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    server::serve(listener, service.dispatcher(), shutdown).await?;

    service.shutdown().await;
    info!(
        devices = service.registry().count().await,
        "Fleet server stopped"
    );
    Ok(())
}
