//! User model and related functionality

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User entity
///
/// Serialized with the field names of the persisted document, so the hash
/// lives under `password`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(rename = "password")]
    pub password_hash: String,
}

/// New user creation payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// User update payload
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateUser {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl UpdateUser {
    /// True when no field would change
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none() && self.password.is_none()
    }
}

impl User {
    /// Overwrite the fields that are present, keeping the rest.
    ///
    /// `password_hash` must already be hashed.
    pub fn merge(
        &mut self,
        username: Option<String>,
        email: Option<String>,
        password_hash: Option<String>,
    ) {
        if let Some(username) = username {
            self.username = username;
        }
        if let Some(email) = email {
            self.email = email;
        }
        if let Some(password_hash) = password_hash {
            self.password_hash = password_hash;
        }
    }
}
