//! Relational-table user storage

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use common::database::{self, DatabaseConfig};
use sqlx::{Any, AnyPool, Executor, Row, any::AnyRow};
use tracing::{debug, info};
use uuid::Uuid;

use super::UserStorage;
use crate::error::{StoreError, StoreResult};
use crate::models::User;

// `user` is a reserved word in PostgreSQL, hence the quoting.
const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS "user" (
        id TEXT PRIMARY KEY NOT NULL,
        username TEXT NOT NULL,
        email TEXT NOT NULL,
        password TEXT NOT NULL
    )
"#;

const SELECT_ALL: &str = r#"SELECT id, username, email, password FROM "user""#;

const SELECT_ONE: &str = r#"SELECT id, username, email, password FROM "user" WHERE id = $1"#;

const INSERT_USER: &str =
    r#"INSERT INTO "user" (id, username, email, password) VALUES ($1, $2, $3, $4)"#;

const UPDATE_USER: &str =
    r#"UPDATE "user" SET username = $1, email = $2, password = $3 WHERE id = $4"#;

const DELETE_USER: &str = r#"DELETE FROM "user" WHERE id = $1"#;

const DELETE_ALL: &str = r#"DELETE FROM "user""#;

/// How update and delete reach the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// One `UPDATE`/`DELETE` statement against the affected row
    #[default]
    Targeted,
    /// Load every row, mutate in memory, clear the table and insert everything again
    Rewrite,
}

impl FromStr for WriteMode {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "targeted" => Ok(WriteMode::Targeted),
            "rewrite" => Ok(WriteMode::Rewrite),
            other => Err(StoreError::Configuration(format!(
                "Unknown write mode: {other}"
            ))),
        }
    }
}

/// User storage on a single `user` table
#[derive(Clone)]
pub struct SqlUserStorage {
    pool: AnyPool,
    write_mode: WriteMode,
}

impl SqlUserStorage {
    /// Wrap an existing pool
    pub fn new(pool: AnyPool, write_mode: WriteMode) -> Self {
        Self { pool, write_mode }
    }

    /// Open a pool for `config` and make sure the table exists
    pub async fn connect(config: &DatabaseConfig, write_mode: WriteMode) -> StoreResult<Self> {
        let pool = database::init_pool(config).await?;
        let storage = Self::new(pool, write_mode);
        storage.ensure_table().await?;
        Ok(storage)
    }

    /// Create the `user` table when it is missing
    pub async fn ensure_table(&self) -> StoreResult<()> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        debug!("User table ready");
        Ok(())
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    async fn load_map(&self) -> StoreResult<HashMap<Uuid, User>> {
        let users = self.load_all().await?;
        Ok(users.into_iter().map(|user| (user.id, user)).collect())
    }

    /// Replace the whole table content with `users`
    async fn rewrite_all(&self, users: &HashMap<Uuid, User>) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(DELETE_ALL).execute(&mut *tx).await?;
        for user in users.values() {
            insert_row(&mut *tx, user).await?;
        }
        tx.commit().await?;

        info!(count = users.len(), "Rewrote user table");
        Ok(())
    }
}

#[async_trait]
impl UserStorage for SqlUserStorage {
    async fn load_all(&self) -> StoreResult<Vec<User>> {
        let rows = sqlx::query(SELECT_ALL).fetch_all(&self.pool).await?;
        rows.iter().map(user_from_row).collect()
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<User>> {
        let row = sqlx::query(SELECT_ONE)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn insert(&self, user: &User) -> StoreResult<()> {
        insert_row(&self.pool, user).await?;
        Ok(())
    }

    async fn replace(&self, user: &User) -> StoreResult<bool> {
        match self.write_mode {
            WriteMode::Targeted => {
                let result = sqlx::query(UPDATE_USER)
                    .bind(user.username.as_str())
                    .bind(user.email.as_str())
                    .bind(user.password_hash.as_str())
                    .bind(user.id.to_string())
                    .execute(&self.pool)
                    .await?;
                Ok(result.rows_affected() > 0)
            }
            WriteMode::Rewrite => {
                let mut users = self.load_map().await?;
                if !users.contains_key(&user.id) {
                    return Ok(false);
                }
                users.insert(user.id, user.clone());
                self.rewrite_all(&users).await?;
                Ok(true)
            }
        }
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        match self.write_mode {
            WriteMode::Targeted => {
                let result = sqlx::query(DELETE_USER)
                    .bind(id.to_string())
                    .execute(&self.pool)
                    .await?;
                Ok(result.rows_affected() > 0)
            }
            WriteMode::Rewrite => {
                let mut users = self.load_map().await?;
                if users.remove(&id).is_none() {
                    return Ok(false);
                }
                self.rewrite_all(&users).await?;
                Ok(true)
            }
        }
    }

    async fn health_check(&self) -> StoreResult<bool> {
        Ok(database::health_check(&self.pool).await?)
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("Database connection pool closed");
    }
}

async fn insert_row<'e, E>(executor: E, user: &User) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Any>,
{
    sqlx::query(INSERT_USER)
        .bind(user.id.to_string())
        .bind(user.username.as_str())
        .bind(user.email.as_str())
        .bind(user.password_hash.as_str())
        .execute(executor)
        .await?;
    Ok(())
}

fn user_from_row(row: &AnyRow) -> StoreResult<User> {
    let id: String = row.try_get("id")?;
    let id = Uuid::parse_str(&id)
        .map_err(|e| StoreError::InvalidRecord(format!("user id {id:?} is not a UUID: {e}")))?;

    Ok(User {
        id,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn storage(mode: WriteMode) -> SqlUserStorage {
        SqlUserStorage::connect(&DatabaseConfig::sqlite_in_memory(), mode)
            .await
            .expect("in-memory storage")
    }

    fn user(name: &str) -> User {
        User {
            id: Uuid::new_v4(),
            username: name.to_string(),
            email: format!("{name}@example.com"),
            password_hash: "$2b$04$notarealhash".to_string(),
        }
    }

    #[test]
    fn write_mode_from_str() {
        assert_eq!("targeted".parse::<WriteMode>().unwrap(), WriteMode::Targeted);
        assert_eq!("REWRITE".parse::<WriteMode>().unwrap(), WriteMode::Rewrite);
        assert!("truncate".parse::<WriteMode>().is_err());
    }

    #[tokio::test]
    async fn insert_get_and_load_all() {
        let storage = storage(WriteMode::Targeted).await;
        let alice = user("alice");
        let bob = user("bob");
        storage.insert(&alice).await.unwrap();
        storage.insert(&bob).await.unwrap();

        assert_eq!(storage.get(alice.id).await.unwrap(), Some(alice.clone()));
        assert_eq!(storage.get(Uuid::new_v4()).await.unwrap(), None);

        let mut all = storage.load_all().await.unwrap();
        all.sort_by(|a, b| a.username.cmp(&b.username));
        assert_eq!(all, vec![alice, bob]);
    }

    #[tokio::test]
    async fn insert_rejects_existing_id() {
        let storage = storage(WriteMode::Targeted).await;
        let alice = user("alice");
        storage.insert(&alice).await.unwrap();

        let err = storage.insert(&alice).await.unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));
    }

    #[tokio::test]
    async fn ensure_table_is_idempotent() {
        let storage = storage(WriteMode::Targeted).await;
        storage.insert(&user("alice")).await.unwrap();
        storage.ensure_table().await.unwrap();
        assert_eq!(storage.load_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rewrite_mode_replaces_and_deletes() {
        let storage = storage(WriteMode::Rewrite).await;
        let alice = user("alice");
        let bob = user("bob");
        storage.insert(&alice).await.unwrap();
        storage.insert(&bob).await.unwrap();

        let mut renamed = alice.clone();
        renamed.username = "alicia".to_string();
        assert!(storage.replace(&renamed).await.unwrap());
        assert!(!storage.replace(&user("ghost")).await.unwrap());

        assert!(storage.delete(bob.id).await.unwrap());
        assert!(!storage.delete(bob.id).await.unwrap());

        assert_eq!(storage.load_all().await.unwrap(), vec![renamed]);
    }

    #[tokio::test]
    async fn failed_rewrite_keeps_existing_rows() {
        let storage = storage(WriteMode::Rewrite).await;
        let alice = user("alice");
        storage.insert(&alice).await.unwrap();
        storage.insert(&user("bob")).await.unwrap();

        sqlx::query(
            r#"CREATE TRIGGER reject_boom BEFORE INSERT ON "user"
               WHEN NEW.username = 'boom'
               BEGIN SELECT RAISE(ABORT, 'boom'); END"#,
        )
        .execute(storage.pool())
        .await
        .unwrap();

        let mut renamed = alice.clone();
        renamed.username = "boom".to_string();
        assert!(storage.replace(&renamed).await.is_err());

        let mut names: Vec<String> = storage
            .load_all()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        names.sort();
        assert_eq!(names, vec!["alice", "bob"]);
    }

    #[tokio::test]
    async fn targeted_mode_reports_missing_rows() {
        let storage = storage(WriteMode::Targeted).await;
        let ghost = user("ghost");
        assert!(!storage.replace(&ghost).await.unwrap());
        assert!(!storage.delete(ghost.id).await.unwrap());
    }

    #[tokio::test]
    async fn rows_with_invalid_ids_are_rejected() {
        let storage = storage(WriteMode::Targeted).await;
        sqlx::query(INSERT_USER)
            .bind("not-a-uuid")
            .bind("mallory")
            .bind("mallory@example.com")
            .bind("hash")
            .execute(storage.pool())
            .await
            .unwrap();

        let err = storage.load_all().await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidRecord(_)));
    }

    #[tokio::test]
    async fn health_check_and_close() {
        let storage = storage(WriteMode::Targeted).await;
        assert!(storage.health_check().await.unwrap());
        storage.close().await;
        assert!(storage.pool().is_closed());
    }
}
