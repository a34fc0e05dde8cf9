//! User store configuration

use std::path::PathBuf;
use std::str::FromStr;

use common::database::DatabaseConfig;

use crate::error::{StoreError, StoreResult};
use crate::password::{DEFAULT_BCRYPT_COST, HashScheme, PasswordHasher};
use crate::storage::WriteMode;

/// Which persistence strategy backs the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// Relational `user` table
    #[default]
    Sql,
    /// Single JSON document on disk
    File,
}

impl FromStr for BackendKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sql" => Ok(BackendKind::Sql),
            "file" => Ok(BackendKind::File),
            other => Err(StoreError::Configuration(format!(
                "Unknown storage backend: {other}"
            ))),
        }
    }
}

/// User store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: BackendKind,
    pub database: DatabaseConfig,
    pub file_path: PathBuf,
    pub write_mode: WriteMode,
    pub hash_scheme: HashScheme,
}

impl StoreConfig {
    /// Create a new StoreConfig from environment variables
    ///
    /// # Environment Variables
    /// - `USER_STORE_BACKEND`: `sql` or `file` (default: `sql`)
    /// - `USER_STORE_FILE`: path of the JSON document (default: `./users.json`)
    /// - `USER_STORE_WRITE_MODE`: `targeted` or `rewrite` (default: `targeted`)
    /// - `PASSWORD_HASH_SCHEME`: `bcrypt` or `argon2` (default: `bcrypt`)
    /// - `PASSWORD_HASH_COST`: bcrypt cost factor (default: 10)
    /// - plus the `DATABASE_*` variables read by [`DatabaseConfig::from_env`]
    pub fn from_env() -> StoreResult<Self> {
        let backend = env_or("USER_STORE_BACKEND", "sql").parse()?;

        let file_path = PathBuf::from(env_or("USER_STORE_FILE", "./users.json"));

        let write_mode = env_or("USER_STORE_WRITE_MODE", "targeted").parse()?;

        let cost = env_or("PASSWORD_HASH_COST", &DEFAULT_BCRYPT_COST.to_string())
            .parse::<u32>()
            .map_err(|e| StoreError::Configuration(format!("Invalid PASSWORD_HASH_COST: {e}")))?;
        let hash_scheme = HashScheme::from_parts(&env_or("PASSWORD_HASH_SCHEME", "bcrypt"), cost)?;

        let database = DatabaseConfig::from_env()?;

        Ok(StoreConfig {
            backend,
            database,
            file_path,
            write_mode,
            hash_scheme,
        })
    }

    pub fn hasher(&self) -> PasswordHasher {
        PasswordHasher::new(self.hash_scheme)
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
