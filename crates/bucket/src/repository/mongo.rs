//! MongoDB Repository

use std::fmt;
use std::future::Future;

use bson::{doc, Bson, Document};
use futures::TryStreamExt;
use mongodb::{Collection, Cursor};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::entity::{resolve_key, Entity, Identifier};
use crate::error::{BucketError, Result};
use crate::repository::Repository;
use crate::task::{RepoTask, TaskContext};

/// [`Repository`] backed by one MongoDB collection.
///
/// Documents are keyed by the stringified identifier stored as `_id`.
pub struct MongoRepository<E: Entity> {
    collection: Collection<E>,
    tasks: TaskContext,
}

impl<E: Entity> MongoRepository<E> {
    pub fn new(collection: Collection<E>, tasks: TaskContext) -> Self {
        Self { collection, tasks }
    }

    pub fn collection_name(&self) -> &str {
        self.collection.name()
    }

    pub fn collection(&self) -> &Collection<E> {
        &self.collection
    }

    pub fn task_context(&self) -> &TaskContext {
        &self.tasks
    }
}

impl<E: Entity> fmt::Debug for MongoRepository<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MongoRepository")
            .field("collection", &self.collection.name())
            .finish()
    }
}

async fn fetch<E: Entity>(collection: &Collection<E>, key: &str) -> Result<Option<E>> {
    Ok(collection.find_one(doc! { "_id": key }).await?)
}

/// Key of `entity` and the document stored under it.
///
/// An `_id` written by the entity itself must already be that key as a
/// string, otherwise the stored document could not be read back as `E`.
fn keyed_document<E: Entity>(entity: &E) -> Result<(String, Document)> {
    let key = resolve_key(entity)?;
    let mut document = bson::to_document(entity)?;

    match document.get("_id").cloned() {
        None => {
            document.insert("_id", key.as_str());
        }
        Some(Bson::String(stored)) if stored == key => {}
        Some(stored) => {
            return Err(BucketError::identifier_conflict::<E>(key, format!("{:?}", stored)));
        }
    }
    Ok((key, document))
}

async fn upsert<E: Entity>(
    collection: &Collection<E>,
    key: &str,
    document: Document,
) -> Result<bool> {
    let result = collection
        .clone_with_type::<Document>()
        .replace_one(doc! { "_id": key }, document)
        .upsert(true)
        .await?;

    // An unchanged replace reports modified_count == 0, so count matches as saved.
    Ok(result.matched_count > 0 || result.upserted_id.is_some())
}

impl<E: Entity> Repository<E> for MongoRepository<E> {
    fn save(&self, entity: E) -> RepoTask<bool> {
        let (key, document) = match keyed_document(&entity) {
            Ok(keyed) => keyed,
            Err(e) => return RepoTask::failed(e),
        };
        debug!("Saving [{}] into {}", key, self.collection_name());

        let collection = self.collection.clone();
        self.tasks
            .spawn(async move { upsert(&collection, &key, document).await })
    }

    fn find_by_id(&self, id: &E::Id) -> RepoTask<Option<E>> {
        let key = id.to_key();
        let collection = self.collection.clone();
        self.tasks.spawn(async move { fetch(&collection, &key).await })
    }

    fn edit<F>(&self, id: E::Id, block: F) -> RepoTask<bool>
    where
        F: FnOnce(Option<E>) -> E + Send + 'static,
    {
        let key = id.to_key();
        debug!("Editing [{}] in {}", key, self.collection_name());

        let collection = self.collection.clone();
        self.tasks.spawn(async move {
            let current = fetch(&collection, &key).await?;
            let (next_key, document) = keyed_document(&block(current))?;
            upsert(&collection, &next_key, document).await
        })
    }

    fn find_all(&self) -> RepoTask<Vec<E>> {
        let collection = self.collection.clone();
        self.tasks.spawn(async move {
            let cursor = collection.find(doc! {}).await?;
            Ok(cursor.try_collect().await?)
        })
    }

    fn delete_by_id(&self, id: &E::Id) -> RepoTask<bool> {
        let key = id.to_key();
        debug!("Deleting [{}] from {}", key, self.collection_name());

        let collection = self.collection.clone();
        self.tasks.spawn(async move {
            let result = collection.delete_one(doc! { "_id": key.as_str() }).await?;
            Ok(result.deleted_count > 0)
        })
    }

    fn delete(&self, entity: &E) -> RepoTask<bool> {
        match entity.id() {
            Some(id) => self.delete_by_id(id),
            None => RepoTask::failed(BucketError::missing_identifier::<E>()),
        }
    }

    fn exists(&self, id: &E::Id) -> RepoTask<bool> {
        let key = id.to_key();
        let collection = self.collection.clone();
        self.tasks.spawn(async move {
            let count = collection
                .count_documents(doc! { "_id": key.as_str() })
                .limit(1)
                .await?;
            Ok(count > 0)
        })
    }

    fn count(&self) -> RepoTask<u64> {
        let collection = self.collection.clone();
        self.tasks
            .spawn(async move { Ok(collection.count_documents(doc! {}).await?) })
    }

    fn with_collection<R, X, F, Fut>(&self, operation: F) -> RepoTask<Option<R>>
    where
        F: FnOnce(Collection<E>) -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<Option<R>, X>> + Send + 'static,
        X: Into<BucketError> + Send + 'static,
        R: Send + 'static,
    {
        let collection = self.collection.clone();
        self.tasks
            .spawn(async move { operation(collection).await.map_err(Into::into) })
    }

    fn find_with<R, F, Fut>(&self, operation: F) -> RepoTask<Vec<R>>
    where
        F: FnOnce(Collection<E>) -> Fut + Send + 'static,
        Fut: Future<Output = mongodb::error::Result<Cursor<R>>> + Send + 'static,
        R: DeserializeOwned + Send + Sync + 'static,
    {
        let collection = self.collection.clone();
        self.tasks.spawn(async move {
            let cursor = operation(collection).await?;
            Ok(cursor.try_collect::<Vec<R>>().await?)
        })
    }
}
