/// Session lifecycle
///
/// Orchestrates login, access-token renewal, revocation, credential
/// changes, and entitlement grants on top of the auth primitives and the
/// store. Every failure leaves here as an `AppError` from the service
/// taxonomy.
///
/// Refresh token states: `Active -> Revoked` (explicit, terminal) and
/// `Active -> Expired` (by clock, terminal). Refresh tokens are not
/// rotated on use; a token stays valid until it expires or is revoked.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::auth::{
    generate_refresh_token, hash_password, issue_access_token, token_fingerprint,
    verify_access_token, verify_password, PasswordError, TokenError,
};
use crate::configuration::AuthSettings;
use crate::error::{AppError, AuthError, ErrorContext};
use crate::store::{Account, AuthStore, StoreError, TokenState};
use crate::validators::{is_valid_email, is_valid_password};

/// Result of a successful login
#[derive(Debug)]
pub struct LoginOutcome {
    pub account: Account,
    pub access_token: String,
    pub refresh_token: String,
}

pub struct SessionManager {
    store: Arc<dyn AuthStore>,
    settings: AuthSettings,
}

impl SessionManager {
    pub fn new(store: Arc<dyn AuthStore>, settings: AuthSettings) -> Self {
        Self { store, settings }
    }

    /// Create an account from an email and a plaintext password
    pub async fn register(&self, email: &str, password: &str) -> Result<Account, AppError> {
        let ctx = ErrorContext::new("register");

        let email = is_valid_email(email).map_err(|e| ctx.record(e.into()))?;
        is_valid_password(password).map_err(|e| ctx.record(e.into()))?;
        let hashed_password = self.hash(password).await.map_err(|e| ctx.record(e))?;

        let account = self
            .bounded("create_account", self.store.create_account(&email, &hashed_password))
            .await
            .map_err(|e| ctx.record(conflict_or_persistence(e)))?;

        tracing::info!(account_id = %account.id, "Account registered");
        Ok(account)
    }

    /// Verify credentials and open a new session
    ///
    /// An unknown email and a wrong password are indistinguishable to the
    /// caller. Tokens are only returned once the refresh token is stored.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, AppError> {
        let ctx = ErrorContext::new("login");

        let account = match self
            .bounded("find_account_by_email", self.store.find_account_by_email(email.trim()))
            .await
        {
            Ok(account) => account,
            Err(StoreError::NotFound) => {
                return Err(ctx.record(AuthError::InvalidCredentials.into()));
            }
            Err(e) => return Err(ctx.record(AppError::Persistence(e))),
        };
        let ctx = ctx.with_account_id(account.id);

        if !self
            .verify(&account.hashed_password, password)
            .await
            .map_err(|e| ctx.record(e))?
        {
            return Err(ctx.record(AuthError::InvalidCredentials.into()));
        }

        let access_token = self.issue(account.id).map_err(|e| ctx.record(e))?;
        let refresh_token =
            generate_refresh_token().map_err(|e| ctx.record(AppError::Entropy(e.to_string())))?;
        let expires_at = Utc::now() + self.settings.refresh_token_ttl();

        self.bounded(
            "insert_refresh_token",
            self.store
                .insert_refresh_token(&refresh_token, account.id, expires_at),
        )
        .await
        .map_err(|e| ctx.record(AppError::Persistence(e)))?;

        tracing::info!(
            account_id = %account.id,
            refresh_token = %token_fingerprint(&refresh_token),
            "Session opened"
        );

        Ok(LoginOutcome {
            account,
            access_token,
            refresh_token,
        })
    }

    /// Mint a new access token from a live refresh token
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, AppError> {
        let ctx = ErrorContext::new("refresh");

        let record = self
            .bounded("find_refresh_token", self.store.find_refresh_token(refresh_token))
            .await
            .map_err(|e| ctx.record(unknown_token_or_persistence(e)))?;
        let ctx = ctx.with_account_id(record.account_id);

        match record.state_at(Utc::now()) {
            TokenState::Active => {}
            TokenState::Revoked => return Err(ctx.record(AuthError::TokenRevoked.into())),
            TokenState::Expired => return Err(ctx.record(AuthError::TokenExpired.into())),
        }

        let access_token = self.issue(record.account_id).map_err(|e| ctx.record(e))?;

        tracing::info!(
            account_id = %record.account_id,
            refresh_token = %token_fingerprint(refresh_token),
            "Access token refreshed"
        );
        Ok(access_token)
    }

    /// Revoke a refresh token. Revoking a revoked token succeeds.
    pub async fn revoke(&self, refresh_token: &str) -> Result<(), AppError> {
        let ctx = ErrorContext::new("revoke");

        let record = self
            .bounded("find_refresh_token", self.store.find_refresh_token(refresh_token))
            .await
            .map_err(|e| ctx.record(unknown_token_or_persistence(e)))?;
        let ctx = ctx.with_account_id(record.account_id);

        if record.revoked_at.is_some() {
            tracing::debug!(
                account_id = %record.account_id,
                refresh_token = %token_fingerprint(refresh_token),
                "Refresh token already revoked"
            );
            return Ok(());
        }

        self.bounded("revoke_refresh_token", self.store.revoke_refresh_token(refresh_token))
            .await
            .map_err(|e| ctx.record(unknown_token_or_persistence(e)))?;

        tracing::info!(
            account_id = %record.account_id,
            refresh_token = %token_fingerprint(refresh_token),
            "Refresh token revoked"
        );
        Ok(())
    }

    /// Replace email and password together
    ///
    /// Existing refresh tokens stay valid unless
    /// `revoke_sessions_on_credential_change` is set.
    pub async fn update_credentials(
        &self,
        account_id: Uuid,
        email: &str,
        password: &str,
    ) -> Result<Account, AppError> {
        let ctx = ErrorContext::new("update_credentials").with_account_id(account_id);

        let email = is_valid_email(email).map_err(|e| ctx.record(e.into()))?;
        is_valid_password(password).map_err(|e| ctx.record(e.into()))?;
        let hashed_password = self.hash(password).await.map_err(|e| ctx.record(e))?;

        let account = self
            .bounded(
                "update_account_credentials",
                self.store
                    .update_account_credentials(account_id, &email, &hashed_password),
            )
            .await
            .map_err(|e| ctx.record(conflict_or_persistence(e)))?;

        if self.settings.revoke_sessions_on_credential_change {
            let revoked = self
                .bounded(
                    "revoke_all_refresh_tokens",
                    self.store.revoke_all_refresh_tokens(account_id),
                )
                .await
                .map_err(|e| ctx.record(AppError::Persistence(e)))?;
            tracing::info!(account_id = %account_id, revoked, "Sessions revoked after credential change");
        }

        tracing::info!(account_id = %account_id, "Credentials updated");
        Ok(account)
    }

    /// Mark an account as upgraded. Idempotent.
    pub async fn grant_entitlement(&self, account_id: Uuid) -> Result<(), AppError> {
        let ctx = ErrorContext::new("grant_entitlement").with_account_id(account_id);

        self.bounded("set_entitlement", self.store.set_entitlement(account_id))
            .await
            .map_err(|e| {
                ctx.record(match e {
                    StoreError::NotFound => AppError::NotFound("Account".to_string()),
                    other => AppError::Persistence(other),
                })
            })?;

        tracing::info!(account_id = %account_id, "Entitlement granted");
        Ok(())
    }

    /// Resolve an access token to the account it was issued for
    pub fn authenticate(&self, access_token: &str) -> Result<Uuid, AppError> {
        verify_access_token(access_token, &self.settings.jwt_secret).map_err(|e| {
            let err = match e {
                TokenError::Expired => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            };
            tracing::debug!(error = %e, "Access token rejected");
            AppError::Auth(err)
        })
    }

    /// Drop refresh tokens that have passed their expiry
    pub async fn purge_expired_refresh_tokens(&self) -> Result<u64, AppError> {
        let ctx = ErrorContext::new("purge_expired_refresh_tokens");

        let deleted = self
            .bounded(
                "delete_expired_refresh_tokens",
                self.store.delete_expired_refresh_tokens(Utc::now()),
            )
            .await
            .map_err(|e| ctx.record(AppError::Persistence(e)))?;

        if deleted > 0 {
            tracing::info!(deleted, "Expired refresh tokens purged");
        }
        Ok(deleted)
    }

    fn issue(&self, account_id: Uuid) -> Result<String, AppError> {
        issue_access_token(
            account_id,
            &self.settings.jwt_secret,
            self.settings.access_token_ttl(),
        )
        .map_err(|e| AppError::Internal(e.to_string()))
    }

    async fn hash(&self, password: &str) -> Result<String, AppError> {
        let password = password.to_string();
        let cost = self.settings.password_hash_cost;

        tokio::task::spawn_blocking(move || hash_password(&password, cost))
            .await
            .map_err(|e| AppError::Hashing(e.to_string()))?
            .map_err(|e| AppError::Hashing(e.to_string()))
    }

    async fn verify(&self, hashed_password: &str, password: &str) -> Result<bool, AppError> {
        let hashed_password = hashed_password.to_string();
        let password = password.to_string();

        tokio::task::spawn_blocking(move || verify_password(&hashed_password, &password))
            .await
            .map_err(|e| AppError::Hashing(e.to_string()))?
            .map_err(|e| match e {
                PasswordError::MalformedHash => {
                    AppError::Hashing("stored password hash is malformed".to_string())
                }
                PasswordError::Hashing(msg) => AppError::Hashing(msg),
            })
    }

    /// Bound a store call by the configured timeout
    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        tokio::time::timeout(self.settings.store_timeout(), call)
            .await
            .unwrap_or(Err(StoreError::Timeout(operation)))
    }
}

fn unknown_token_or_persistence(err: StoreError) -> AppError {
    match err {
        StoreError::NotFound => AuthError::UnknownToken.into(),
        other => AppError::Persistence(other),
    }
}

fn conflict_or_persistence(err: StoreError) -> AppError {
    match err {
        StoreError::Duplicate(_) => AppError::Conflict("Email already registered".to_string()),
        StoreError::NotFound => AppError::NotFound("Account".to_string()),
        other => AppError::Persistence(other),
    }
}
