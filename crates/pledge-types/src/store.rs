//! Persistence seams. Services receive these as trait objects at construction,
//! so the SQLite backend and any in-memory stand-in are interchangeable.

use uuid::Uuid;

use crate::models::{Promise, RefreshToken, User};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

pub trait UserStore: Send + Sync {
    fn insert_user(&self, user: &User) -> StoreResult<()>;
    fn user_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;
    fn user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    fn user_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    fn email_exists(&self, email: &str) -> StoreResult<bool>;
    fn username_exists(&self, username: &str) -> StoreResult<bool>;
    fn list_users(&self) -> StoreResult<Vec<User>>;
    /// Overwrites username, role and `updated_at` of an existing row.
    fn update_user(&self, user: &User) -> StoreResult<()>;
    /// Returns `false` if no row matched.
    fn delete_user(&self, id: Uuid) -> StoreResult<bool>;
}

pub trait RefreshTokenStore: Send + Sync {
    fn insert_refresh_token(&self, token: &RefreshToken) -> StoreResult<()>;
    fn refresh_token(&self, token: &str) -> StoreResult<Option<RefreshToken>>;
    /// Returns `false` if no row matched.
    fn delete_refresh_token(&self, token: &str) -> StoreResult<bool>;
}

pub trait PromiseStore: Send + Sync {
    fn insert_promise(&self, promise: &Promise) -> StoreResult<()>;
    fn promise_by_id(&self, id: Uuid) -> StoreResult<Option<Promise>>;
    fn promises_by_user(&self, user_id: Uuid) -> StoreResult<Vec<Promise>>;
    fn promises_by_parent(&self, parent_id: Uuid) -> StoreResult<Vec<Promise>>;
    fn all_promises(&self) -> StoreResult<Vec<Promise>>;
    fn public_promises(&self) -> StoreResult<Vec<Promise>>;
    /// Persists the merged entity. For a root, the privacy flag is written
    /// through to its progress entries in the same transaction.
    fn update_promise(&self, promise: &Promise) -> StoreResult<()>;
    /// Hard delete. Progress entries of a deleted root go with it.
    fn delete_promise(&self, id: Uuid) -> StoreResult<bool>;
}
