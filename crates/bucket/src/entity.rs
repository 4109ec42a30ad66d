//! Entity Metadata
//!
//! An entity is a serde type stored as one document in a named collection.
//! The collection name and identifier accessor are usually generated with
//! `#[derive(Entity)]`:
//!
//! ```rust,ignore
//! use bucket::Entity;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Entity)]
//! #[entity(collection = "offline_player")]
//! pub struct OfflinePlayer {
//!     #[entity(id)]
//!     #[serde(rename = "_id")]
//!     pub identifier: String,
//!     pub last_name: String,
//! }
//! ```

use std::fmt::Display;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{BucketError, Result};

/// A value usable as a document key. The stringified form is stored as `_id`.
pub trait Identifier: Send + Sync + 'static {
    fn to_key(&self) -> String;
}

impl<T> Identifier for T
where
    T: Display + Send + Sync + 'static,
{
    fn to_key(&self) -> String {
        self.to_string()
    }
}

/// A record type bound to one collection.
///
/// Documents are stored with `_id` set to the identifier's string key. Only
/// rename the identifier field to `_id` when it serializes as that same
/// string (`String`, or `Uuid` in its hyphenated form). Other identifier
/// types keep their own field name; saving one renamed to `_id` fails with
/// `IdentifierConflict`.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Type of the field marked as identifier.
    type Id: Identifier;

    /// Name of the collection documents of this type are stored in.
    const COLLECTION: &'static str;

    /// Current identifier value, `None` when the entity has none yet.
    fn id(&self) -> Option<&Self::Id>;
}

/// Collection declared by `E`, rejecting blank names.
pub(crate) fn collection_name<E: Entity>() -> Result<&'static str> {
    let name = E::COLLECTION;
    if name.trim().is_empty() {
        return Err(BucketError::missing_metadata::<E>());
    }
    Ok(name)
}

/// Document key of `entity`, or `MissingIdentifier`.
pub(crate) fn resolve_key<E: Entity>(entity: &E) -> Result<String> {
    entity
        .id()
        .map(Identifier::to_key)
        .ok_or_else(BucketError::missing_identifier::<E>)
}
