//! Credential store adapter.
//!
//! Every directory operation runs inside exactly one [`Transaction`], opened
//! with [`Store::begin`] and finished with `commit` or `rollback`. Nothing is
//! cached between transactions.

pub mod memory;
pub mod mysql;

use crate::model::{Credential, Group, Membership, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub use self::memory::MemoryStore;
pub use self::mysql::MySqlStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Open a transaction scope.
    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError>;

    /// Cheap liveness probe used by the health endpoint.
    async fn ping(&self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait Transaction: Send {
    /// Stored hash and disabled flag for `username`.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] when no such user exists.
    async fn credential(&mut self, username: &str) -> Result<Credential, StoreError>;

    async fn record_login(&mut self, username: &str, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Replace the stored hash in place; `at` becomes the new password-set time.
    async fn upgrade_hash(
        &mut self,
        username: &str,
        hash: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// All users ordered by id, with `groups` left empty.
    async fn users(&mut self) -> Result<Vec<User>, StoreError>;

    /// All groups ordered by id, with `members` left empty.
    async fn groups(&mut self) -> Result<Vec<Group>, StoreError>;

    /// All association rows ordered by `(user_id, group_id)`.
    async fn memberships(&mut self) -> Result<Vec<Membership>, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
