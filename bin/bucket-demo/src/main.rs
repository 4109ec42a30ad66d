//! Bucket Demo
//!
//! Connects, edits one `offline_player` document (creating it when absent),
//! prints the stored record, and disconnects.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `BUCKET_CONFIG` | - | TOML connection config, replaces the variables below |
//! | `BUCKET_MONGO_URI` | `mongodb://localhost:27017` | MongoDB connection URI |
//! | `BUCKET_MONGO_USERNAME` | - | Username |
//! | `BUCKET_MONGO_PASSWORD` | - | Password |
//! | `BUCKET_MONGO_AUTH_SOURCE` | `admin` | Credential database |
//! | `BUCKET_APP_NAME` | `bucket-demo` | Application name |
//! | `BUCKET_MONGO_DB` | `bucket` | Database name |
//! | `RUST_LOG` | `info` | Log level |

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use bucket::{ConnectionConfig, DataRepositories, Entity, Repository};

#[derive(Debug, Clone, Serialize, Deserialize, Entity)]
#[serde(rename_all = "camelCase")]
#[entity(collection = "offline_player")]
struct OfflinePlayer {
    #[entity(id)]
    #[serde(rename = "_id")]
    identifier: String,
    last_name: String,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    last_seen: DateTime<Utc>,
}

impl OfflinePlayer {
    fn new(identifier: String) -> Self {
        Self {
            identifier,
            last_name: "Unknown".to_string(),
            last_seen: Utc::now(),
        }
    }
}

/// Bucket demo
#[derive(Parser, Debug)]
#[command(name = "bucket-demo")]
#[command(about = "Edit an offline player record through a Bucket repository")]
struct Args {
    /// TOML connection config (replaces the connection flags)
    #[arg(long, env = "BUCKET_CONFIG")]
    config: Option<PathBuf>,

    /// MongoDB connection URI
    #[arg(long, env = "BUCKET_MONGO_URI", default_value = "mongodb://localhost:27017")]
    uri: String,

    /// MongoDB username
    #[arg(long, env = "BUCKET_MONGO_USERNAME")]
    username: Option<String>,

    /// MongoDB password
    #[arg(long, env = "BUCKET_MONGO_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Database holding the credential
    #[arg(long, env = "BUCKET_MONGO_AUTH_SOURCE", default_value = "admin")]
    auth_source: String,

    /// Application name reported to the server
    #[arg(long, env = "BUCKET_APP_NAME", default_value = "bucket-demo")]
    application_name: String,

    /// Database name
    #[arg(long, env = "BUCKET_MONGO_DB", default_value = "bucket")]
    database: String,

    /// Player identifier (random when omitted)
    #[arg(long)]
    player_id: Option<String>,

    /// Last name to store on the player
    #[arg(long, default_value = "OhWowEditingAValue")]
    last_name: String,
}

impl Args {
    fn connection_config(&self) -> Result<ConnectionConfig> {
        if let Some(path) = &self.config {
            return ConnectionConfig::load(path)
                .with_context(|| format!("Failed to load config from {}", path.display()));
        }

        let mut config = ConnectionConfig::new(self.uri.clone())
            .with_auth_source(self.auth_source.clone())
            .with_application_name(self.application_name.clone())
            .with_database(self.database.clone());
        if let Some(username) = &self.username {
            config = config.with_credentials(
                username.clone(),
                self.password.clone().unwrap_or_default(),
            );
        }
        config.validate()?;
        Ok(config)
    }
}

async fn run(registry: &DataRepositories, args: &Args) -> Result<()> {
    let players = registry.get_or_create::<OfflinePlayer>()?;

    let id = args
        .player_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let last_name = args.last_name.clone();
    let fresh_id = id.clone();

    let saved = players
        .edit(id.clone(), move |found| {
            let mut player = found.unwrap_or_else(|| OfflinePlayer::new(fresh_id));
            player.last_name = last_name;
            player.last_seen = Utc::now();
            player
        })
        .await?;
    info!("Edited player [{}] (saved: {})", id, saved);

    if let Some(player) = players.find_by_id(&id).await? {
        println!("{}", serde_json::to_string_pretty(&player)?);
    }

    let count = players.count().await?;
    info!("{} players stored in {}", count, players.collection_name());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let args = Args::parse();
    let config = args.connection_config()?;

    info!("Starting Bucket demo");
    let registry = DataRepositories::global();
    registry.connect(&config).await?;

    let result = run(registry, &args).await;
    registry.close().await;
    result
}
