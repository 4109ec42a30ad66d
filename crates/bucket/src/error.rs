//! Bucket Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BucketError {
    #[error("MongoDB connection is not established")]
    NotConnected,

    #[error("Missing entity metadata: {type_name} declares no collection name")]
    MissingMetadata { type_name: &'static str },

    #[error("No identifier found on {type_name}")]
    MissingIdentifier { type_name: &'static str },

    #[error("{type_name} serializes _id as {stored}, expected the string key \"{key}\"")]
    IdentifierConflict {
        type_name: &'static str,
        key: String,
        stored: String,
    },

    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bson::ser::Error),

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("No async runtime available: {0}")]
    Runtime(#[from] tokio::runtime::TryCurrentError),

    #[error("Task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl BucketError {
    pub fn missing_metadata<E>() -> Self {
        Self::MissingMetadata {
            type_name: std::any::type_name::<E>(),
        }
    }

    pub fn missing_identifier<E>() -> Self {
        Self::MissingIdentifier {
            type_name: std::any::type_name::<E>(),
        }
    }

    pub fn identifier_conflict<E>(key: impl Into<String>, stored: impl Into<String>) -> Self {
        Self::IdentifierConflict {
            type_name: std::any::type_name::<E>(),
            key: key.into(),
            stored: stored.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }
}

pub type Result<T> = std::result::Result<T, BucketError>;
