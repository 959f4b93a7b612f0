//! Capstan server binary.

use anyhow::{Context, Result};
use capstan_core::config::AppConfig;
use capstan_server::bootstrap::ensure_users;
use capstan_server::{AppState, create_router};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Capstan - a Docker Registry v1 server
#[derive(Parser, Debug)]
#[command(name = "capstand")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "CAPSTAN_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Capstan v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration (file is optional, env vars can provide/override
    // everything; every field has a default)
    let config_path = std::path::Path::new(&args.config);
    let mut figment = Figment::new();
    if config_path.exists() {
        tracing::info!(config_path = %args.config, "Loading configuration from file");
        figment = figment.merge(Toml::file(&args.config));
    } else {
        tracing::debug!("No config file found at {}", args.config);
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("CAPSTAN_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    // Initialize blob storage
    let blobs = capstan_storage::from_config(&config.storage)
        .await
        .context("failed to initialize blob storage")?;

    // Initialize metadata store
    let metadata = capstan_metadata::from_config(&config.metadata)
        .await
        .context("failed to initialize metadata store")?;
    metadata
        .health_check()
        .await
        .context("metadata store unhealthy")?;

    // Seed configured users
    ensure_users(&metadata, &config.users)
        .await
        .context("failed to seed configured users")?;

    let bind = config.server.bind.clone();
    let state = AppState::new(config, blobs, metadata);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    tracing::info!(addr = %bind, "Capstan registry listening");

    axum::serve(listener, router).await.context("server error")?;
    Ok(())
}
