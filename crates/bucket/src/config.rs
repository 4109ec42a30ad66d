//! Connection Configuration
//!
//! Settings can come from environment variables, a TOML file, or be built in
//! code.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `BUCKET_MONGO_URI` | `mongodb://localhost:27017` | MongoDB connection URI |
//! | `BUCKET_MONGO_USERNAME` | - | Username, no credential when unset |
//! | `BUCKET_MONGO_PASSWORD` | - | Password for the username |
//! | `BUCKET_MONGO_AUTH_SOURCE` | `admin` | Database holding the credential |
//! | `BUCKET_APP_NAME` | `bucket` | Application name reported to the server |
//! | `BUCKET_MONGO_DB` | `bucket` | Database the repositories use |

use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::error::{BucketError, Result};

pub const DEFAULT_URI: &str = "mongodb://localhost:27017";
pub const DEFAULT_AUTH_SOURCE: &str = "admin";
pub const DEFAULT_APPLICATION_NAME: &str = "bucket";
pub const DEFAULT_DATABASE: &str = "bucket";

/// A password that never shows up in `Debug` output.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("Secret(<empty>)")
        } else {
            f.write_str("Secret(***)")
        }
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub uri: String,
    pub username: Option<String>,
    pub password: Secret,
    pub auth_source: String,
    pub application_name: String,
    pub database: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_URI.to_string(),
            username: None,
            password: Secret::default(),
            auth_source: DEFAULT_AUTH_SOURCE.to_string(),
            application_name: DEFAULT_APPLICATION_NAME.to_string(),
            database: DEFAULT_DATABASE.to_string(),
        }
    }
}

impl ConnectionConfig {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Self::default()
        }
    }

    /// Read `BUCKET_*` variables from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let or = |key: &str, default: String| {
            lookup(key).filter(|v| !v.is_empty()).unwrap_or(default)
        };

        Self {
            uri: or("BUCKET_MONGO_URI", defaults.uri),
            username: lookup("BUCKET_MONGO_USERNAME").filter(|v| !v.is_empty()),
            password: lookup("BUCKET_MONGO_PASSWORD").map(Secret::from).unwrap_or_default(),
            auth_source: or("BUCKET_MONGO_AUTH_SOURCE", defaults.auth_source),
            application_name: or("BUCKET_APP_NAME", defaults.application_name),
            database: or("BUCKET_MONGO_DB", defaults.database),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| BucketError::configuration(format!("invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            BucketError::configuration(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.uri.trim().is_empty() {
            return Err(BucketError::configuration("uri must not be blank"));
        }
        if self.database.trim().is_empty() {
            return Err(BucketError::configuration("database must not be blank"));
        }
        if self.username.is_none() && !self.password.is_empty() {
            return Err(BucketError::configuration("password given without a username"));
        }
        Ok(())
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<Secret>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = password.into();
        self
    }

    pub fn with_auth_source(mut self, auth_source: impl Into<String>) -> Self {
        self.auth_source = auth_source.into();
        self
    }

    pub fn with_application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = name.into();
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }
}
