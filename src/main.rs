use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use verdict_gate::config::Config;
use verdict_gate::server::Server;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let config = Config::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("verdict_gate={},tower_http=debug", config.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting verdict-gate service");
    tracing::info!(
        "Configuration: bind_addr={}, rate_limit_backend={}, summarize_limit={}/{}ms",
        config.bind_addr,
        if config.redis_url.is_some() { "redis" } else { "memory" },
        config.summarize_rate_limit,
        config.summarize_window_ms
    );

    let server = Server::from_config(&config)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create server: {}", e))?;

    server
        .run()
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
