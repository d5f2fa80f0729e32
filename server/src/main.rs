// server/src/main.rs

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use lib::{EntityStore, MemoryEntityStore, SledEntityStore};
use rest_api::{start_server, AppState};
use security::{AdminCredentials, Authenticator};

mod config;

use config::{load_config, StorageEngineType};

/// School vaccination portal server.
#[derive(Debug, Parser)]
#[command(name = "vaccination-portal", version, about)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long, env = "PORTAL_CONFIG")]
    config: Option<PathBuf>,

    /// Overrides the configured listen port.
    #[arg(long)]
    port: Option<u16>,

    /// Overrides the configured storage engine (memory|sled).
    #[arg(long, value_parser = parse_engine)]
    storage: Option<StorageEngineType>,

    /// Overrides the configured sled data directory.
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

fn parse_engine(value: &str) -> Result<StorageEngineType, String> {
    value.parse().map_err(|e: anyhow::Error| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(engine) = cli.storage {
        config.storage.engine = engine;
    }
    if let Some(data_dir) = cli.data_dir {
        config.storage.data_directory = data_dir;
    }

    let store: Arc<dyn EntityStore> = match config.storage.engine {
        StorageEngineType::Memory => {
            info!("using in-memory entity store");
            Arc::new(MemoryEntityStore::new())
        }
        StorageEngineType::Sled => {
            info!(path = %config.storage.data_directory.display(), "using sled entity store");
            Arc::new(
                SledEntityStore::open(&config.storage.data_directory)
                    .context("Failed to open sled entity store")?,
            )
        }
    };

    let authenticator = Authenticator::new(
        AdminCredentials {
            username: config.auth.username.clone(),
            password: config.auth.password.clone(),
        },
        config.auth.jwt_secret.as_bytes(),
    );

    let state = AppState::new(store, authenticator);
    let addr = config
        .server
        .socket_addr()
        .context("Invalid server host/port configuration")?;

    start_server(addr, state).await
}
