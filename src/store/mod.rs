/// Persistence contract consumed by the session manager
///
/// Accounts and refresh tokens live behind two async traits so the
/// manager can run against Postgres in production and an in-process
/// store in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

mod memory;
mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

/// Store failures
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("duplicate entry: {0}")]
    Duplicate(String),
    #[error("store call timed out: {0}")]
    Timeout(&'static str),
    #[error("database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                StoreError::Duplicate(db_err.message().to_string())
            }
            sqlx::Error::PoolTimedOut => StoreError::Timeout("connection pool"),
            other => StoreError::Database(other.to_string()),
        }
    }
}

/// Identity record
#[derive(Clone, sqlx::FromRow)]
pub struct Account {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub email: String,
    pub hashed_password: String,
    pub is_upgraded: bool,
}

// Keeps the hash out of any `{:?}` that ends up in a log line.
impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("is_upgraded", &self.is_upgraded)
            .finish_non_exhaustive()
    }
}

/// Public account fields, as returned to clients
#[derive(Debug, Clone, Serialize)]
pub struct AccountView {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub email: String,
    pub is_upgraded: bool,
}

impl From<&Account> for AccountView {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            created_at: account.created_at,
            updated_at: account.updated_at,
            email: account.email.clone(),
            is_upgraded: account.is_upgraded,
        }
    }
}

/// Where a refresh token sits in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Active,
    Revoked,
    Expired,
}

/// Stored refresh token. The token value itself is not kept.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RefreshTokenRecord {
    #[sqlx(rename = "user_id")]
    pub account_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl RefreshTokenRecord {
    /// Revocation is terminal and takes precedence over expiry
    pub fn state_at(&self, now: DateTime<Utc>) -> TokenState {
        if self.revoked_at.is_some() {
            TokenState::Revoked
        } else if now >= self.expires_at {
            TokenState::Expired
        } else {
            TokenState::Active
        }
    }
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn create_account(&self, email: &str, hashed_password: &str) -> Result<Account, StoreError>;

    async fn find_account_by_email(&self, email: &str) -> Result<Account, StoreError>;

    async fn find_account_by_id(&self, id: Uuid) -> Result<Account, StoreError>;

    async fn update_account_credentials(
        &self,
        id: Uuid,
        email: &str,
        hashed_password: &str,
    ) -> Result<Account, StoreError>;

    /// Idempotent; `NotFound` if the account does not exist
    async fn set_entitlement(&self, id: Uuid) -> Result<(), StoreError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert_refresh_token(
        &self,
        token: &str,
        account_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn find_refresh_token(&self, token: &str) -> Result<RefreshTokenRecord, StoreError>;

    /// Sets `revoked_at` if it is unset; an already revoked token is left
    /// untouched. `NotFound` if no such token exists.
    async fn revoke_refresh_token(&self, token: &str) -> Result<(), StoreError>;

    /// Revoke every active token of an account, returning how many changed
    async fn revoke_all_refresh_tokens(&self, account_id: Uuid) -> Result<u64, StoreError>;

    /// Delete tokens whose expiry is at or before `now`
    async fn delete_expired_refresh_tokens(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// Everything the session manager needs from persistence
pub trait AuthStore: AccountStore + SessionStore {}

impl<T: AccountStore + SessionStore> AuthStore for T {}
