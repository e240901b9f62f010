use anyhow::Result;
use clap::Parser;
use postgen::config::Config;
use postgen::server::Server;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Flags fall back to environment variables
    let config = Config::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("postgen={},tower_http=debug", config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting postgen service");
    tracing::info!(
        "Configuration: bind_address={}, request_limit={}, topics_table={}, styles_table={}",
        config.bind_addr,
        config.request_limit,
        config.topics_table,
        config.styles_table
    );

    let server = Server::new(config)
        .map_err(|e| anyhow::anyhow!("Failed to create server: {}", e))?;

    server
        .run()
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
