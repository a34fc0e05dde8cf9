//! User account store
//!
//! Create, read, update and delete user records, with passwords kept as
//! salted one-way hashes. Records live either in a relational `user` table
//! ([`storage::SqlUserStorage`]) or in a single JSON document
//! ([`storage::JsonFileStorage`]); [`UserStore`] is the facade over both.
//!
//! ```rust,no_run
//! use users::{NewUser, UserStore, config::StoreConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = StoreConfig::from_env()?;
//!     let store = UserStore::open(&config).await?;
//!     let user = store
//!         .create(&NewUser {
//!             username: "ada".into(),
//!             email: "ada@example.com".into(),
//!             password: "analytical-engine".into(),
//!         })
//!         .await?;
//!     assert!(store.compare_password("ada@example.com", "analytical-engine").await?.is_some());
//!     store.remove(user.id).await?;
//!     store.close().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod models;
pub mod password;
pub mod storage;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use models::{NewUser, UpdateUser, User};
pub use store::UserStore;
