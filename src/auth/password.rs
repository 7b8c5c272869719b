/// Password Hashing and Verification
///
/// bcrypt output is self-describing (`$2b$<cost>$<salt><digest>`), so
/// verification needs nothing besides the stored hash.

use bcrypt::{hash, verify, BcryptError};

/// bcrypt ignores input past this many bytes
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Failures of the credential hasher. A wrong password is not an error,
/// see [`verify_password`].
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error("stored password hash is malformed")]
    MalformedHash,
}

/// Hash a password with a per-call random salt at the given bcrypt cost
///
/// # Errors
/// Returns `PasswordError::Hashing` if the password is longer than
/// `MAX_PASSWORD_BYTES`, the cost is out of range, or the salt could not
/// be drawn.
pub fn hash_password(password: &str, cost: u32) -> Result<String, PasswordError> {
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(PasswordError::Hashing(format!(
            "password exceeds {} bytes",
            MAX_PASSWORD_BYTES
        )));
    }

    hash(password, cost).map_err(|e| PasswordError::Hashing(e.to_string()))
}

/// Verify a password against its hash
///
/// Returns `Ok(false)` on mismatch. The comparison inside bcrypt is
/// constant-time. A password longer than `MAX_PASSWORD_BYTES` never
/// matches, since bcrypt would only compare its prefix.
///
/// # Errors
/// Returns `PasswordError::MalformedHash` if `password_hash` is not a
/// bcrypt hash string.
pub fn verify_password(password_hash: &str, password: &str) -> Result<bool, PasswordError> {
    if password.len() > MAX_PASSWORD_BYTES {
        return Ok(false);
    }

    match verify(password, password_hash) {
        Ok(matches) => Ok(matches),
        Err(
            BcryptError::InvalidHash(_)
            | BcryptError::InvalidPrefix(_)
            | BcryptError::InvalidCost(_)
            | BcryptError::InvalidBase64(_),
        ) => Err(PasswordError::MalformedHash),
        Err(e) => Err(PasswordError::Hashing(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Minimum cost accepted by bcrypt; keeps the suite fast.
    const TEST_COST: u32 = 4;

    #[test]
    fn test_hash_password() {
        let password = "correcthorse";
        let hash = hash_password(password, TEST_COST).expect("Failed to hash password");

        assert_ne!(password, hash);
        assert!(hash.starts_with("$2"));
        assert!(hash.contains("$04$"));
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("correcthorse", TEST_COST).expect("Failed to hash password");

        let is_valid = verify_password(&hash, "correcthorse").expect("Failed to verify password");
        assert!(is_valid);
    }

    #[test]
    fn test_verify_wrong_password() {
        let hash = hash_password("correcthorse", TEST_COST).expect("Failed to hash password");

        let is_valid =
            verify_password(&hash, "batterystaple").expect("Failed to verify password");
        assert!(!is_valid);
    }

    #[test]
    fn test_same_password_gets_fresh_salt() {
        let first = hash_password("correcthorse", TEST_COST).unwrap();
        let second = hash_password("correcthorse", TEST_COST).unwrap();

        assert_ne!(first, second);
        assert!(verify_password(&first, "correcthorse").unwrap());
        assert!(verify_password(&second, "correcthorse").unwrap());
    }

    #[test]
    fn test_longer_password_with_same_prefix_does_not_match() {
        let password = "a".repeat(MAX_PASSWORD_BYTES);
        let hash = hash_password(&password, TEST_COST).expect("Failed to hash password");

        assert!(verify_password(&hash, &password).unwrap());
        let extended = format!("{}-different-suffix", password);
        assert!(!verify_password(&hash, &extended).unwrap());
    }

    #[test]
    fn test_hash_rejects_overlong_password() {
        let result = hash_password(&"a".repeat(MAX_PASSWORD_BYTES + 1), TEST_COST);
        assert!(matches!(result, Err(PasswordError::Hashing(_))));
    }

    #[test]
    fn test_malformed_hash() {
        let result = verify_password("not-a-bcrypt-hash", "correcthorse");
        assert!(matches!(result, Err(PasswordError::MalformedHash)));
    }

    #[test]
    fn test_cost_out_of_range() {
        let result = hash_password("correcthorse", 3);
        assert!(matches!(result, Err(PasswordError::Hashing(_))));
    }
}
