//! Connection Registry
//!
//! Owns the MongoDB connection and the per-entity repository cache.
//! A registry can be built explicitly and passed around, or the process-wide
//! instance from [`DataRepositories::global`] can be used.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use bson::doc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use mongodb::options::{ClientOptions, Credential};
use mongodb::{Client, Database};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::config::ConnectionConfig;
use crate::entity::{self, Entity};
use crate::error::{BucketError, Result};
use crate::repository::MongoRepository;
use crate::task::TaskContext;

static GLOBAL: Lazy<DataRepositories> = Lazy::new(DataRepositories::new);

/// Client and database handles, always installed and removed together.
#[derive(Clone)]
struct Connection {
    client: Client,
    database: Database,
}

pub struct DataRepositories {
    connection: RwLock<Option<Connection>>,
    repositories: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    runtime: Option<Handle>,
}

impl Default for DataRepositories {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DataRepositories {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataRepositories")
            .field("connected", &self.is_connected())
            .field("repositories", &self.repositories.len())
            .finish()
    }
}

impl DataRepositories {
    /// Registry whose repositories spawn onto the runtime they were created on.
    pub fn new() -> Self {
        Self {
            connection: RwLock::new(None),
            repositories: DashMap::new(),
            runtime: None,
        }
    }

    /// Registry whose repositories all spawn onto `handle`.
    pub fn with_runtime(handle: Handle) -> Self {
        Self {
            runtime: Some(handle),
            ..Self::new()
        }
    }

    /// The process-wide registry.
    pub fn global() -> &'static DataRepositories {
        &GLOBAL
    }

    pub async fn connect(&self, config: &ConnectionConfig) -> Result<()> {
        self.connect_with(config, |_| {}).await
    }

    /// Connect, letting `customize` adjust the driver options before the
    /// client is built.
    ///
    /// Does nothing if already connected. The handles are only installed once
    /// a `ping` against the database succeeded.
    pub async fn connect_with<F>(&self, config: &ConnectionConfig, customize: F) -> Result<()>
    where
        F: FnOnce(&mut ClientOptions),
    {
        if self.is_connected() {
            info!("Already connected to MongoDB.");
            return Ok(());
        }
        config.validate()?;

        info!("Connecting to MongoDB: {}/{}", config.uri, config.database);
        let mut options = ClientOptions::parse(&config.uri).await?;
        if let Some(username) = &config.username {
            options.credential = Some(
                Credential::builder()
                    .username(username.clone())
                    .password(config.password.expose().to_string())
                    .source(config.auth_source.clone())
                    .build(),
            );
        }
        options.app_name = Some(config.application_name.clone());
        customize(&mut options);

        let client = Client::with_options(options)?;
        let database = client.database(&config.database);
        database.run_command(doc! { "ping": 1 }).await?;

        let installed = {
            let mut slot = self.connection.write();
            if slot.is_some() {
                false
            } else {
                *slot = Some(Connection { client: client.clone(), database });
                true
            }
        };

        if installed {
            info!("Successfully connected to MongoDB");
        } else {
            warn!("Another caller connected to MongoDB first, discarding this client");
            client.shutdown().await;
        }
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connection.read().is_some()
    }

    pub fn database(&self) -> Result<Database> {
        self.connection
            .read()
            .as_ref()
            .map(|connection| connection.database.clone())
            .ok_or(BucketError::NotConnected)
    }

    pub fn client(&self) -> Result<Client> {
        self.connection
            .read()
            .as_ref()
            .map(|connection| connection.client.clone())
            .ok_or(BucketError::NotConnected)
    }

    /// Drop the connection and every cached repository. Safe to call at any
    /// time, any number of times.
    pub async fn close(&self) {
        let connection = self.connection.write().take();
        self.repositories.clear();

        if let Some(connection) = connection {
            info!("MongoDB connection closed");
            connection.client.shutdown().await;
        }
    }

    /// Repository for `E`, created on first request.
    ///
    /// All callers get the same instance until [`close`](Self::close).
    pub fn get_or_create<E: Entity>(&self) -> Result<Arc<MongoRepository<E>>> {
        let cached = match self.repositories.entry(TypeId::of::<E>()) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let repository = self.build_repository::<E>()?;
                let erased: Arc<dyn Any + Send + Sync> = repository.clone();
                entry.insert(erased);
                return Ok(repository);
            }
        };

        cached.downcast::<MongoRepository<E>>().map_err(|_| {
            BucketError::internal(format!(
                "cached repository for {} has the wrong type",
                std::any::type_name::<E>()
            ))
        })
    }

    /// Number of cached repositories.
    pub fn repository_count(&self) -> usize {
        self.repositories.len()
    }

    fn build_repository<E: Entity>(&self) -> Result<Arc<MongoRepository<E>>> {
        let collection_name = entity::collection_name::<E>()?;
        let database = self.database()?;
        let tasks = self.task_context()?;

        debug!(
            "Creating repository for {} on collection {}",
            std::any::type_name::<E>(),
            collection_name
        );
        let collection = database.collection::<E>(collection_name);
        Ok(Arc::new(MongoRepository::new(collection, tasks)))
    }

    fn task_context(&self) -> Result<TaskContext> {
        match &self.runtime {
            Some(handle) => Ok(TaskContext::new(handle.clone())),
            None => TaskContext::current(),
        }
    }

    #[cfg(test)]
    pub(crate) fn install(&self, client: Client, database: &str) {
        let database = client.database(database);
        *self.connection.write() = Some(Connection { client, database });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    const UNREACHABLE: &str = "mongodb://127.0.0.1:1/?serverSelectionTimeoutMS=200";

    #[derive(Debug, Serialize, Deserialize, crate::Entity)]
    #[entity(collection = "offline_player")]
    struct OfflinePlayer {
        #[entity(id)]
        #[serde(rename = "_id")]
        identifier: String,
    }

    #[derive(Debug, Serialize, Deserialize, crate::Entity)]
    #[entity(collection = "guilds")]
    struct Guild {
        #[entity(id)]
        #[serde(rename = "_id")]
        name: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Orphan {
        id: String,
    }

    impl Entity for Orphan {
        type Id = String;
        const COLLECTION: &'static str = "";

        fn id(&self) -> Option<&String> {
            Some(&self.id)
        }
    }

    async fn lazily_connected() -> DataRepositories {
        let registry = DataRepositories::new();
        let client = Client::with_uri_str(UNREACHABLE).await.unwrap();
        registry.install(client, "bucket");
        registry
    }

    #[test]
    fn test_database_requires_connection() {
        let registry = DataRepositories::new();
        assert!(!registry.is_connected());
        assert!(matches!(registry.database(), Err(BucketError::NotConnected)));
        assert!(matches!(registry.client(), Err(BucketError::NotConnected)));
    }

    #[test]
    fn test_get_or_create_requires_connection() {
        let registry = DataRepositories::new();
        let err = registry.get_or_create::<OfflinePlayer>().unwrap_err();
        assert!(matches!(err, BucketError::NotConnected));
        assert_eq!(registry.repository_count(), 0);
    }

    #[test]
    fn test_missing_metadata_checked_first() {
        let registry = DataRepositories::new();
        let err = registry.get_or_create::<Orphan>().unwrap_err();
        assert!(matches!(err, BucketError::MissingMetadata { .. }));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let registry = DataRepositories::new();
        registry.close().await;
        registry.close().await;
        assert!(!registry.is_connected());
    }

    #[tokio::test]
    async fn test_same_type_same_instance() {
        let registry = lazily_connected().await;
        let first = registry.get_or_create::<OfflinePlayer>().unwrap();
        let second = registry.get_or_create::<OfflinePlayer>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.collection_name(), "offline_player");
        assert_eq!(registry.repository_count(), 1);
    }

    #[tokio::test]
    async fn test_distinct_types_distinct_instances() {
        let registry = lazily_connected().await;
        let players = registry.get_or_create::<OfflinePlayer>().unwrap();
        let guilds = registry.get_or_create::<Guild>().unwrap();
        assert_eq!(players.collection_name(), "offline_player");
        assert_eq!(guilds.collection_name(), "guilds");
        assert_eq!(registry.repository_count(), 2);
    }

    #[tokio::test]
    async fn test_close_clears_cache_and_connection() {
        let registry = lazily_connected().await;
        registry.get_or_create::<OfflinePlayer>().unwrap();
        assert!(registry.is_connected());

        registry.close().await;
        assert!(!registry.is_connected());
        assert_eq!(registry.repository_count(), 0);
        assert!(matches!(
            registry.get_or_create::<OfflinePlayer>(),
            Err(BucketError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_reconnect_builds_fresh_repository() {
        let registry = lazily_connected().await;
        let before = registry.get_or_create::<OfflinePlayer>().unwrap();
        registry.close().await;

        let client = Client::with_uri_str("mongodb://127.0.0.1:1").await.unwrap();
        registry.install(client, "bucket");
        let after = registry.get_or_create::<OfflinePlayer>().unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
    }

    #[tokio::test]
    async fn test_concurrent_get_or_create_single_winner() {
        let registry = Arc::new(lazily_connected().await);
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.get_or_create::<Guild>().unwrap() })
            })
            .collect();

        let first = registry.get_or_create::<Guild>().unwrap();
        for handle in handles {
            assert!(Arc::ptr_eq(&first, &handle.await.unwrap()));
        }
        assert_eq!(registry.repository_count(), 1);
    }

    #[tokio::test]
    async fn test_connect_failure_leaves_registry_empty() {
        let registry = DataRepositories::new();
        let config = ConnectionConfig::new(UNREACHABLE);
        let err = registry.connect(&config).await.unwrap_err();
        assert!(matches!(err, BucketError::Database(_)));
        assert!(!registry.is_connected());
    }

    #[tokio::test]
    async fn test_connect_when_connected_is_noop() {
        let registry = lazily_connected().await;
        // Would fail to ping, but the existing connection short-circuits it.
        registry.connect(&ConnectionConfig::default()).await.unwrap();
        assert!(registry.is_connected());
    }

    #[tokio::test]
    async fn test_connect_with_customizes_options() {
        let registry = DataRepositories::new();
        let config = ConnectionConfig::new("mongodb://127.0.0.1:1/")
            .with_application_name("bucket-tests");

        let mut app_name = None;
        let err = registry
            .connect_with(&config, |options| {
                app_name = options.app_name.clone();
                options.server_selection_timeout = Some(Duration::from_millis(200));
            })
            .await
            .unwrap_err();

        assert!(matches!(err, BucketError::Database(_)));
        assert_eq!(app_name.as_deref(), Some("bucket-tests"));
        assert!(!registry.is_connected());
    }

    #[test]
    fn test_repositories_spawn_onto_configured_runtime() {
        let io = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("bucket-io")
            .enable_all()
            .build()
            .unwrap();
        let caller = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let registry = DataRepositories::with_runtime(io.handle().clone());

        let worker = caller.block_on(async {
            let client = Client::with_uri_str(UNREACHABLE).await.unwrap();
            registry.install(client, "bucket");

            let players = registry.get_or_create::<OfflinePlayer>().unwrap();
            let worker = players
                .task_context()
                .spawn(async { Ok(std::thread::current().name().map(str::to_owned)) })
                .await
                .unwrap();
            registry.close().await;
            worker
        });

        assert_eq!(worker.as_deref(), Some("bucket-io"));
    }
}
