/// Authentication module
///
/// Credential hashing, access token signing/verification, refresh token
/// generation, and Authorization header parsing. Stateless; persistence
/// lives in `crate::store` and orchestration in `crate::session`.

mod bearer;
mod claims;
mod jwt;
mod password;
mod refresh_token;

pub use bearer::{extract_api_key, extract_bearer_token};
pub use claims::{Claims, ISSUER};
pub use jwt::{issue_access_token, verify_access_token, TokenError};
pub use password::{hash_password, verify_password, PasswordError, MAX_PASSWORD_BYTES};
pub use refresh_token::{generate_refresh_token, token_digest, token_fingerprint, EntropyError};
