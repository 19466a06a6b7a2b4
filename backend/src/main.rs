//! Server entry point.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use postforge_backend::api::{self, AppState};
use postforge_backend::config::Config;
use postforge_backend::db::{self, MongoStore};

#[derive(Parser)]
#[command(name = "postforge", about = "AI-assisted content platform backend")]
struct Cli {
    /// Path to an env file loaded before configuration
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Override SERVER_HOST
    #[arg(long)]
    host: Option<String>,

    /// Override SERVER_PORT
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Missing env file is fine; the environment may be fully set already.
    let _ = dotenvy::from_filename(&cli.env_file);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = Config::from_env().context("invalid configuration")?;
    if let Some(host) = cli.host {
        config.server_host = host;
    }
    if let Some(port) = cli.port {
        config.server_port = port;
    }

    let db = db::postgres::connect(&config)
        .await
        .context("PostgreSQL connection failed")?;
    let mongo = MongoStore::connect(&config)
        .await
        .context("MongoDB connection failed")?;

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let state = Arc::new(AppState::new(db, mongo, config));
    let app = api::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!(addr = %addr, "Postforge listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
