//! Bucket
//!
//! Generic MongoDB repositories:
//! - One shared connection with connect/close lifecycle
//! - One repository per entity type, created on first use
//! - Asynchronous CRUD keyed by the entity identifier
//! - `#[derive(Entity)]` for collection names and identifier fields
//!
//! ```rust,ignore
//! use bucket::{ConnectionConfig, DataRepositories, Entity, Repository};
//!
//! let registry = DataRepositories::global();
//! registry.connect(&ConnectionConfig::from_env()).await?;
//!
//! let players = registry.get_or_create::<OfflinePlayer>()?;
//! players
//!     .edit(id.clone(), move |found| {
//!         let mut player = found.unwrap_or_else(|| OfflinePlayer::new(id));
//!         player.last_name = "Steve".to_string();
//!         player
//!     })
//!     .await?;
//!
//! registry.close().await;
//! ```

extern crate self as bucket;

pub mod config;
pub mod entity;
pub mod error;
pub mod registry;
pub mod repository;
pub mod savable;
pub mod task;

pub use config::{ConnectionConfig, Secret};
pub use entity::{Entity, Identifier};
pub use error::{BucketError, Result};
pub use registry::DataRepositories;
pub use repository::{MongoRepository, Repository};
pub use savable::Savable;
pub use task::{RepoTask, TaskContext};

#[cfg(feature = "derive")]
pub use bucket_derive::Entity;

// Re-exported so callers can write custom queries against the same driver.
pub use bson;
pub use mongodb;
