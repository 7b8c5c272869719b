/// In-process store
///
/// Backs the test suites and the `memory` database backend. Refresh tokens
/// are keyed by digest, same as in Postgres.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Account, AccountStore, RefreshTokenRecord, SessionStore, StoreError};
use crate::auth::token_digest;

#[derive(Default)]
pub struct InMemoryStore {
    accounts: RwLock<HashMap<Uuid, Account>>,
    refresh_tokens: RwLock<HashMap<String, RefreshTokenRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All refresh tokens bound to an account, oldest first
    pub async fn refresh_tokens_for(&self, account_id: Uuid) -> Vec<RefreshTokenRecord> {
        let mut records: Vec<_> = self
            .refresh_tokens
            .read()
            .await
            .values()
            .filter(|record| record.account_id == account_id)
            .cloned()
            .collect();
        records.sort_by_key(|record| record.created_at);
        records
    }
}

#[async_trait]
impl AccountStore for InMemoryStore {
    async fn create_account(&self, email: &str, hashed_password: &str) -> Result<Account, StoreError> {
        let mut accounts = self.accounts.write().await;
        if accounts.values().any(|account| account.email == email) {
            return Err(StoreError::Duplicate(format!("email {}", email)));
        }

        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            email: email.to_string(),
            hashed_password: hashed_password.to_string(),
            is_upgraded: false,
        };
        accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Account, StoreError> {
        self.accounts
            .read()
            .await
            .values()
            .find(|account| account.email == email)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn find_account_by_id(&self, id: Uuid) -> Result<Account, StoreError> {
        self.accounts
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update_account_credentials(
        &self,
        id: Uuid,
        email: &str,
        hashed_password: &str,
    ) -> Result<Account, StoreError> {
        let mut accounts = self.accounts.write().await;
        if accounts
            .values()
            .any(|account| account.email == email && account.id != id)
        {
            return Err(StoreError::Duplicate(format!("email {}", email)));
        }

        let account = accounts.get_mut(&id).ok_or(StoreError::NotFound)?;
        account.email = email.to_string();
        account.hashed_password = hashed_password.to_string();
        account.updated_at = Utc::now();
        Ok(account.clone())
    }

    async fn set_entitlement(&self, id: Uuid) -> Result<(), StoreError> {
        let mut accounts = self.accounts.write().await;
        let account = accounts.get_mut(&id).ok_or(StoreError::NotFound)?;
        account.is_upgraded = true;
        account.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn insert_refresh_token(
        &self,
        token: &str,
        account_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        // Mirrors the foreign key on refresh_tokens.user_id
        if !self.accounts.read().await.contains_key(&account_id) {
            return Err(StoreError::Database(format!(
                "no account {} for refresh token",
                account_id
            )));
        }

        let mut tokens = self.refresh_tokens.write().await;
        let key = token_digest(token);
        if tokens.contains_key(&key) {
            return Err(StoreError::Duplicate("refresh token".to_string()));
        }

        let now = Utc::now();
        tokens.insert(
            key,
            RefreshTokenRecord {
                account_id,
                created_at: now,
                updated_at: now,
                expires_at,
                revoked_at: None,
            },
        );
        Ok(())
    }

    async fn find_refresh_token(&self, token: &str) -> Result<RefreshTokenRecord, StoreError> {
        self.refresh_tokens
            .read()
            .await
            .get(&token_digest(token))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn revoke_refresh_token(&self, token: &str) -> Result<(), StoreError> {
        let mut tokens = self.refresh_tokens.write().await;
        let record = tokens
            .get_mut(&token_digest(token))
            .ok_or(StoreError::NotFound)?;

        if record.revoked_at.is_none() {
            let now = Utc::now();
            record.revoked_at = Some(now);
            record.updated_at = now;
        }
        Ok(())
    }

    async fn revoke_all_refresh_tokens(&self, account_id: Uuid) -> Result<u64, StoreError> {
        let now = Utc::now();
        let mut revoked = 0;
        for record in self.refresh_tokens.write().await.values_mut() {
            if record.account_id == account_id
                && record.revoked_at.is_none()
                && record.expires_at > now
            {
                record.revoked_at = Some(now);
                record.updated_at = now;
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn delete_expired_refresh_tokens(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut tokens = self.refresh_tokens.write().await;
        let before = tokens.len();
        tokens.retain(|_, record| record.expires_at > now);
        Ok((before - tokens.len()) as u64)
    }
}
