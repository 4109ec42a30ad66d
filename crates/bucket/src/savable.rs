//! Self-saving entities.
//!
//! Optional convenience for callers that would rather write
//! `player.save_global().await` than look up the repository themselves.

use crate::entity::Entity;
use crate::registry::DataRepositories;
use crate::repository::Repository;
use crate::task::RepoTask;

pub trait Savable: Entity {
    /// Save through the repository `registry` holds for this type.
    fn save_to(self, registry: &DataRepositories) -> RepoTask<bool> {
        match registry.get_or_create::<Self>() {
            Ok(repository) => repository.save(self),
            Err(e) => RepoTask::failed(e),
        }
    }

    /// Save through [`DataRepositories::global`].
    fn save_global(self) -> RepoTask<bool> {
        self.save_to(DataRepositories::global())
    }
}

impl<E: Entity> Savable for E {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BucketError;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, crate::Entity)]
    #[entity(collection = "warps")]
    struct Warp {
        #[entity(id)]
        name: String,
    }

    #[tokio::test]
    async fn test_save_to_disconnected_registry() {
        let registry = DataRepositories::new();
        let task = Warp { name: "spawn".to_string() }.save_to(&registry);
        assert!(task.is_ready());
        assert!(matches!(task.await, Err(BucketError::NotConnected)));
    }
}
