/// Refresh Token Generation
///
/// Refresh tokens are:
/// - 32 bytes from the operating system CSPRNG, hex-encoded (64 chars)
/// - Stored only as a SHA-256 digest
/// - Referred to in logs by a short fingerprint of that digest

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

const TOKEN_BYTES: usize = 32;
const FINGERPRINT_LEN: usize = 12;

/// The OS random source could not produce bytes
#[derive(Debug, thiserror::Error)]
#[error("secure random source unavailable: {0}")]
pub struct EntropyError(String);

/// Generate a new refresh token
///
/// There is no fallback to a weaker generator; a failing OS source fails
/// the calling operation.
pub fn generate_refresh_token() -> Result<String, EntropyError> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| EntropyError(e.to_string()))?;
    Ok(hex::encode(bytes))
}

/// SHA-256 digest of a token, hex-encoded. This is the storage key.
pub fn token_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Short, non-reversible identifier for a token, safe to log
pub fn token_fingerprint(token: &str) -> String {
    let mut digest = token_digest(token);
    digest.truncate(FINGERPRINT_LEN);
    digest
}
