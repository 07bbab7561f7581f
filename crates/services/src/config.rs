use std::env;
use std::fs;
use std::path::PathBuf;

use companion_core::model::{ChapterCatalog, UserId};
use storage::remote::RemoteConfig;
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://companion.sqlite3";

/// Session configuration, typically read from the environment and then
/// overridden by command-line flags.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompanionConfig {
    pub database_url: Option<String>,
    pub catalog_path: Option<PathBuf>,
    pub remote_url: Option<String>,
    pub remote_key: Option<String>,
    pub user_id: Option<String>,
    pub access_token: Option<String>,
}

/// Where this session's progress is persisted. Chosen once per session.
#[derive(Clone, Debug)]
pub enum BackendSelection {
    Local {
        database_url: String,
    },
    Remote {
        config: RemoteConfig,
        user_id: UserId,
        access_token: Option<String>,
    },
}

impl CompanionConfig {
    /// Read `COMPANION_*` variables from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup. Blank values count as unset.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| normalize_optional(lookup(key));
        Self {
            database_url: get("COMPANION_DB_URL"),
            catalog_path: get("COMPANION_CATALOG").map(PathBuf::from),
            remote_url: get("COMPANION_REMOTE_URL"),
            remote_key: get("COMPANION_REMOTE_KEY"),
            user_id: get("COMPANION_USER_ID"),
            access_token: get("COMPANION_ACCESS_TOKEN"),
        }
    }

    #[must_use]
    pub fn database_url(&self) -> &str {
        self.database_url.as_deref().unwrap_or(DEFAULT_DATABASE_URL)
    }

    /// Pick the persistence backend: remote when a user is signed in,
    /// local otherwise.
    ///
    /// # Errors
    ///
    /// With a signed-in user, returns `ConfigError::MissingRemoteCredentials`
    /// if the URL or key is absent, `ConfigError::InvalidRemoteUrl` for an
    /// unparsable URL, and `ConfigError::UserId` for a malformed id. Without
    /// a user the remote settings are not consulted.
    pub fn backend_selection(&self) -> Result<BackendSelection, ConfigError> {
        let Some(raw_user) = self.user_id.as_deref() else {
            return Ok(BackendSelection::Local {
                database_url: self.database_url().to_owned(),
            });
        };

        let user_id: UserId = raw_user.parse()?;
        let (Some(raw_url), Some(api_key)) = (self.remote_url.as_deref(), self.remote_key.as_ref())
        else {
            return Err(ConfigError::MissingRemoteCredentials);
        };
        let endpoint =
            Url::parse(raw_url).map_err(|_| ConfigError::InvalidRemoteUrl(raw_url.to_owned()))?;

        Ok(BackendSelection::Remote {
            config: RemoteConfig::new(endpoint, api_key.clone()),
            user_id,
            access_token: self.access_token.clone(),
        })
    }

    /// Load the chapter catalog from `catalog_path`, or the built-in one.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::CatalogIo` if the file cannot be read and
    /// `ConfigError::Catalog` if it is invalid.
    pub fn load_catalog(&self) -> Result<ChapterCatalog, ConfigError> {
        let Some(path) = &self.catalog_path else {
            return Ok(ChapterCatalog::builtin());
        };
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::CatalogIo {
            path: path.clone(),
            source,
        })?;
        Ok(ChapterCatalog::from_json(&raw)?)
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}
