//! User store facade
//!
//! Passwords are hashed here, at the boundary: on create, on update when a
//! new password is supplied, and verified on credential lookup. Storage
//! backends only ever see hashes.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::error::StoreResult;
use crate::models::{NewUser, UpdateUser, User};
use crate::password::PasswordHasher;
use crate::storage::{self, UserStorage};

/// User store
#[derive(Clone)]
pub struct UserStore {
    storage: Arc<dyn UserStorage>,
    hasher: PasswordHasher,
}

impl UserStore {
    /// Create a store over an already opened backend
    pub fn new(storage: Arc<dyn UserStorage>, hasher: PasswordHasher) -> Self {
        Self { storage, hasher }
    }

    /// Open the backend selected by `config`
    pub async fn open(config: &StoreConfig) -> StoreResult<Self> {
        let storage = storage::open(config).await?;
        Ok(Self::new(storage, config.hasher()))
    }

    pub fn storage(&self) -> &Arc<dyn UserStorage> {
        &self.storage
    }

    pub async fn health_check(&self) -> StoreResult<bool> {
        self.storage.health_check().await
    }

    /// Release the backend. The store must not be used afterwards.
    pub async fn close(&self) {
        self.storage.close().await;
    }

    /// Every stored user, in no particular order
    pub async fn find_all(&self) -> StoreResult<Vec<User>> {
        self.storage.load_all().await
    }

    /// Find a user by ID
    pub async fn find_one(&self, id: Uuid) -> StoreResult<Option<User>> {
        debug!("Finding user by ID: {}", id);
        self.storage.get(id).await
    }

    /// Create a new user with a freshly generated id and hashed password.
    ///
    /// Username and email are not checked for uniqueness.
    pub async fn create(&self, new_user: &NewUser) -> StoreResult<User> {
        info!("Creating new user: {}", new_user.username);

        let user = User {
            id: Uuid::new_v4(),
            username: new_user.username.clone(),
            email: new_user.email.clone(),
            password_hash: self.hasher.hash(&new_user.password)?,
        };
        self.storage.insert(&user).await?;

        info!(user_id = %user.id, "User created");
        Ok(user)
    }

    /// First user whose username equals `name`
    pub async fn find_by_name(&self, name: &str) -> StoreResult<Option<User>> {
        debug!("Finding user by username: {}", name);
        let users = self.storage.load_all().await?;
        Ok(users.into_iter().find(|user| user.username == name))
    }

    /// First user whose email equals `email`
    pub async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        debug!("Finding user by email: {}", email);
        let users = self.storage.load_all().await?;
        Ok(users.into_iter().find(|user| user.email == email))
    }

    /// The user with this email, if `supplied` matches their password.
    ///
    /// Unknown email, wrong password and an unreadable stored hash all
    /// return `None`.
    pub async fn compare_password(&self, email: &str, supplied: &str) -> StoreResult<Option<User>> {
        let Some(user) = self.find_by_email(email).await? else {
            return Ok(None);
        };

        match self.hasher.verify(supplied, &user.password_hash) {
            Ok(true) => Ok(Some(user)),
            Ok(false) => Ok(None),
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "Stored password hash could not be verified");
                Ok(None)
            }
        }
    }

    /// Merge `changes` over the stored user, re-hashing a supplied password.
    ///
    /// Returns `None` without side effects when the id is unknown. An empty
    /// payload returns the stored record without writing.
    pub async fn update(&self, id: Uuid, changes: UpdateUser) -> StoreResult<Option<User>> {
        let Some(mut user) = self.storage.get(id).await? else {
            debug!("Update skipped, no user with ID: {}", id);
            return Ok(None);
        };
        if changes.is_empty() {
            return Ok(Some(user));
        }

        let UpdateUser {
            username,
            email,
            password,
        } = changes;
        let password_hash = password
            .map(|plain| self.hasher.hash(&plain))
            .transpose()?;
        user.merge(username, email, password_hash);

        // The record can vanish between the read and the write.
        if !self.storage.replace(&user).await? {
            debug!("Update skipped, user removed concurrently: {}", id);
            return Ok(None);
        }

        info!(user_id = %id, "User updated");
        Ok(Some(user))
    }

    /// Delete the user. Unknown ids are a no-op.
    pub async fn remove(&self, id: Uuid) -> StoreResult<()> {
        if self.storage.delete(id).await? {
            info!(user_id = %id, "User removed");
        } else {
            debug!("Remove skipped, no user with ID: {}", id);
        }
        Ok(())
    }
}
