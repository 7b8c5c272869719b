/// Access token claims (RFC 7519 registered claims only)

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Issuer stamped into and required on every access token
pub const ISSUER: &str = "chirpy";

/// JWT Claims for access tokens
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Issuer
    pub iss: String,
    /// Subject (account ID as UUID string)
    pub sub: String,
    /// Issued at (Unix timestamp, UTC)
    pub iat: i64,
    /// Expiration time (Unix timestamp, UTC)
    pub exp: i64,
}

impl Claims {
    /// Claims for `account_id`, issued at `now` and valid for `ttl`
    pub fn new(account_id: Uuid, now: chrono::DateTime<chrono::Utc>, ttl: chrono::Duration) -> Self {
        Self {
            iss: ISSUER.to_string(),
            sub: account_id.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }

    /// Parse the subject back into an account ID
    pub fn account_id(&self) -> Result<Uuid, uuid::Error> {
        Uuid::parse_str(&self.sub)
    }

    /// A token is live only while `now` is strictly before `exp`
    pub fn is_expired_at(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        now.timestamp() >= self.exp
    }
}
