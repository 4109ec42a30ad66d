//! Repository Layer
//!
//! Generic CRUD over one collection, keyed by the entity identifier.

pub mod mongo;

use std::future::Future;

use mongodb::{Collection, Cursor};
use serde::de::DeserializeOwned;

use crate::entity::Entity;
use crate::error::BucketError;
use crate::task::RepoTask;

pub use mongo::MongoRepository;

/// CRUD operations for entity type `E`.
///
/// Every method returns at once. The work runs on the repository's task
/// context whether or not the returned [`RepoTask`] is awaited. Operations are
/// independent of each other: nothing orders or isolates two calls, and two
/// writes to the same identifier race with the last one winning.
pub trait Repository<E: Entity>: Send + Sync {
    /// Upsert `entity` under its identifier.
    ///
    /// Resolves to `true` when a document was matched or inserted. Fails with
    /// `MissingIdentifier` without touching the database when the entity has
    /// no identifier.
    fn save(&self, entity: E) -> RepoTask<bool>;

    /// Document stored under `id`, or `None`.
    fn find_by_id(&self, id: &E::Id) -> RepoTask<Option<E>>;

    /// Read the entity under `id`, pass it (or `None`) to `block`, save the
    /// result.
    ///
    /// The read and the write are two separate driver calls. Another writer
    /// can update the document between them, and that update is overwritten.
    fn edit<F>(&self, id: E::Id, block: F) -> RepoTask<bool>
    where
        F: FnOnce(Option<E>) -> E + Send + 'static;

    /// Every document in the collection. Not paginated.
    fn find_all(&self) -> RepoTask<Vec<E>>;

    /// `true` if a document was removed.
    fn delete_by_id(&self, id: &E::Id) -> RepoTask<bool>;

    /// Delete the document stored under `entity`'s identifier.
    fn delete(&self, entity: &E) -> RepoTask<bool>;

    /// Count-based existence check, the document itself is never fetched.
    fn exists(&self, id: &E::Id) -> RepoTask<bool>;

    fn count(&self) -> RepoTask<u64>;

    /// Run custom logic against the raw collection.
    fn with_collection<R, X, F, Fut>(&self, operation: F) -> RepoTask<Option<R>>
    where
        F: FnOnce(Collection<E>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Option<R>, X>> + Send + 'static,
        X: Into<BucketError> + Send + 'static,
        R: Send + 'static;

    /// Run a custom query and drain its cursor into memory.
    fn find_with<R, F, Fut>(&self, operation: F) -> RepoTask<Vec<R>>
    where
        F: FnOnce(Collection<E>) -> Fut + Send + 'static,
        Fut: Future<Output = mongodb::error::Result<Cursor<R>>> + Send + 'static,
        R: DeserializeOwned + Send + Sync + 'static;
}
