//! Flat-file user storage
//!
//! The whole collection is held in memory and written back as one JSON
//! document (`{"<id>": {record}}`) after every mutation. Writes go to a
//! sibling temporary file that is then renamed over the document.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::{fs, sync::RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use super::UserStorage;
use crate::error::{StoreError, StoreResult};
use crate::models::User;

type UserMap = HashMap<Uuid, User>;

/// User storage backed by a single JSON document
pub struct JsonFileStorage {
    path: PathBuf,
    users: RwLock<UserMap>,
}

impl JsonFileStorage {
    /// Load the document at `path`.
    ///
    /// A missing or blank file starts an empty collection; a malformed one is an error.
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let users = match fs::read_to_string(&path).await {
            Ok(data) if data.trim().is_empty() => UserMap::new(),
            Ok(data) => parse_document(&data)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "User document not found, starting empty");
                UserMap::new()
            }
            Err(e) => return Err(e.into()),
        };

        info!(path = %path.display(), count = users.len(), "User document loaded");
        Ok(Self {
            path,
            users: RwLock::new(users),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, users: &UserMap) -> StoreResult<()> {
        let data = serde_json::to_string(users)?;
        let tmp = temp_path(&self.path);
        fs::write(&tmp, data).await?;
        fs::rename(&tmp, &self.path).await?;

        debug!(path = %self.path.display(), count = users.len(), "User document saved");
        Ok(())
    }
}

#[async_trait]
impl UserStorage for JsonFileStorage {
    async fn load_all(&self) -> StoreResult<Vec<User>> {
        Ok(self.users.read().await.values().cloned().collect())
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn insert(&self, user: &User) -> StoreResult<()> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.id) {
            return Err(StoreError::DuplicateId(user.id));
        }

        users.insert(user.id, user.clone());
        if let Err(e) = self.persist(&users).await {
            users.remove(&user.id);
            return Err(e);
        }
        Ok(())
    }

    async fn replace(&self, user: &User) -> StoreResult<bool> {
        let mut users = self.users.write().await;
        let Some(previous) = users.insert(user.id, user.clone()) else {
            users.remove(&user.id);
            return Ok(false);
        };

        if let Err(e) = self.persist(&users).await {
            users.insert(previous.id, previous);
            return Err(e);
        }
        Ok(true)
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let mut users = self.users.write().await;
        let Some(previous) = users.remove(&id) else {
            return Ok(false);
        };

        if let Err(e) = self.persist(&users).await {
            users.insert(previous.id, previous);
            return Err(e);
        }
        Ok(true)
    }

    async fn health_check(&self) -> StoreResult<bool> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        Ok(fs::metadata(dir).await.map(|m| m.is_dir()).unwrap_or(false))
    }

    async fn close(&self) {
        debug!(path = %self.path.display(), "File storage closed");
    }
}

fn parse_document(data: &str) -> StoreResult<UserMap> {
    let users: UserMap = serde_json::from_str(data)?;
    if let Some((key, user)) = users.iter().find(|(key, user)| **key != user.id) {
        return Err(StoreError::InvalidRecord(format!(
            "document key {key} holds record with id {}",
            user.id
        )));
    }
    Ok(users)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "users.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}
