/// JWT Token Generation and Validation
///
/// HS256 access tokens. Stateless: validity is the signature plus `exp`,
/// nothing is looked up on verification.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::claims::{Claims, ISSUER};

/// Access token codec failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token signature does not verify")]
    BadSignature,
    #[error("token has expired")]
    Expired,
    #[error("token is malformed")]
    Malformed,
    #[error("token signing failed: {0}")]
    Signing(String),
}

/// Issue a signed access token for `account_id` that expires after `ttl`
///
/// # Errors
/// Returns `TokenError::Signing` if the claims cannot be encoded
pub fn issue_access_token(
    account_id: Uuid,
    secret: &str,
    ttl: Duration,
) -> Result<String, TokenError> {
    let claims = Claims::new(account_id, Utc::now(), ttl);

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| TokenError::Signing(e.to_string()))
}

/// Verify an access token and return the account it was issued for
///
/// # Errors
/// - `BadSignature`: tampered token or different secret
/// - `Expired`: signature is fine, but `exp` is not in the future
/// - `Malformed`: not a token we could have issued
pub fn verify_access_token(token: &str, secret: &str) -> Result<Uuid, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.set_issuer(&[ISSUER]);
    validation.set_required_spec_claims(&["exp", "iss", "sub"]);

    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::InvalidSignature => TokenError::BadSignature,
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => {
            tracing::debug!(error = %e, "Rejected malformed access token");
            TokenError::Malformed
        }
    })?;

    // jsonwebtoken accepts exp == now; a live token needs now < exp.
    if claims.is_expired_at(Utc::now()) {
        return Err(TokenError::Expired);
    }

    claims.account_id().map_err(|_| TokenError::Malformed)
}
