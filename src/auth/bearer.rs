/// Authorization header parsing

use actix_web::http::header::{HeaderMap, AUTHORIZATION};

use crate::error::AuthError;

const BEARER_PREFIX: &str = "Bearer ";
const API_KEY_PREFIX: &str = "ApiKey ";

/// Extract the token from `Authorization: Bearer <token>`
///
/// The prefix is case-sensitive with exactly one space. A missing header,
/// another scheme, or an empty/whitespace-bearing token is `MissingToken`.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AuthError> {
    extract_credential(headers, BEARER_PREFIX)
}

/// Extract the key from `Authorization: ApiKey <key>`
pub fn extract_api_key(headers: &HeaderMap) -> Result<String, AuthError> {
    extract_credential(headers, API_KEY_PREFIX)
}

fn extract_credential(headers: &HeaderMap, prefix: &str) -> Result<String, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AuthError::MissingToken)?;

    match value.strip_prefix(prefix) {
        Some(credential) if !credential.is_empty() && !credential.contains(char::is_whitespace) => {
            Ok(credential.to_string())
        }
        _ => Err(AuthError::MissingToken),
    }
}
