/// Error Handling Module
///
/// One taxonomy for every failure the service can report:
/// 1. Domain-specific error types (validation, auth, configuration)
/// 2. The unified `AppError` that handlers and the session manager return
/// 3. HTTP response mapping with a single error body shape
/// 4. Structured error logging with operation context

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};

use crate::store::StoreError;

/// ============================================================================
/// 1. DOMAIN-SPECIFIC ERROR TYPES
/// ============================================================================

/// Validation errors for input data
#[derive(Debug, Clone, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is empty")]
    EmptyField(String),
    #[error("{0} is too short (minimum {1} characters)")]
    TooShort(String, usize),
    #[error("{0} is too long (maximum {1} bytes)")]
    TooLong(String, usize),
    #[error("{0} has invalid format")]
    InvalidFormat(String),
    #[error("request body is malformed")]
    MalformedBody,
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required config: {0}")]
    MissingRequired(String),
    #[error("Invalid config value: {0}")]
    InvalidValue(String),
    #[error("Config parse error: {0}")]
    Parse(#[from] config::ConfigError),
}

/// Authentication errors. All of them surface as 401.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Incorrect email or password")]
    InvalidCredentials,
    #[error("Missing or malformed authorization header")]
    MissingToken,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token has expired")]
    TokenExpired,
    #[error("Token has been revoked")]
    TokenRevoked,
    #[error("Unknown refresh token")]
    UnknownToken,
}

impl AuthError {
    fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::MissingToken => "UNAUTHORIZED",
            AuthError::InvalidToken => "TOKEN_INVALID",
            AuthError::TokenExpired => "TOKEN_EXPIRED",
            AuthError::TokenRevoked => "TOKEN_REVOKED",
            AuthError::UnknownToken => "TOKEN_UNKNOWN",
        }
    }
}

/// ============================================================================
/// 2. UNIFIED APPLICATION ERROR TYPE
/// ============================================================================

/// Central error type that all application errors map to
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Persistence failure: {0}")]
    Persistence(StoreError),
    #[error("Password hashing failed: {0}")]
    Hashing(String),
    #[error("Entropy source unavailable: {0}")]
    Entropy(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Internal error: {0}")]
    Internal(String),
}

// ============================================================================
// 3. HTTP RESPONSE MAPPING
// ============================================================================

/// Error body returned for every failed request
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ErrorResponse {
    /// Human-readable, client-safe message
    pub error: String,
    /// Stable error code for client-side handling
    pub code: String,
    /// Correlates the response with the server-side log line
    pub error_id: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String) -> Self {
        Self {
            error: message,
            code,
            error_id,
        }
    }
}

/// Trait for converting errors to HTTP responses with proper logging
pub trait ErrorHandler {
    fn error_response(&self, error_id: &str) -> (StatusCode, ErrorResponse);
    fn log_error(&self, error_id: &str);
}

impl AppError {
    fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Auth(e) => e.code(),
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Persistence(StoreError::Timeout(_)) => "SERVICE_UNAVAILABLE",
            AppError::Persistence(_) => "DATABASE_ERROR",
            AppError::Hashing(_) | AppError::Entropy(_) => "CRYPTO_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message that is safe to send to the client. Server faults never
    /// carry their underlying detail.
    fn public_message(&self) -> String {
        match self {
            AppError::Validation(e) => e.to_string(),
            AppError::Auth(e) => e.to_string(),
            AppError::Forbidden(_) => "Forbidden".to_string(),
            AppError::NotFound(what) => format!("{} not found", what),
            AppError::Conflict(msg) => msg.clone(),
            AppError::Persistence(StoreError::Timeout(_)) => {
                "Database service temporarily unavailable".to_string()
            }
            AppError::Persistence(_) => "Database error occurred".to_string(),
            AppError::Hashing(_) | AppError::Entropy(_) => {
                "Credential processing failed".to_string()
            }
            AppError::Config(_) => "Server configuration error".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl ErrorHandler for AppError {
    fn error_response(&self, error_id: &str) -> (StatusCode, ErrorResponse) {
        let status = ResponseError::status_code(self);
        let body = ErrorResponse::new(
            error_id.to_string(),
            self.public_message(),
            self.code().to_string(),
        );
        (status, body)
    }

    fn log_error(&self, error_id: &str) {
        match self {
            AppError::Validation(e) => {
                tracing::warn!(error_id = error_id, error = %e, "Validation error");
            }
            AppError::Auth(e) => {
                tracing::warn!(error_id = error_id, error = %e, "Authentication error");
            }
            AppError::Forbidden(_) | AppError::NotFound(_) | AppError::Conflict(_) => {
                tracing::info!(error_id = error_id, error = %self, "Request rejected");
            }
            AppError::Persistence(e) => {
                tracing::error!(error_id = error_id, error = %e, "Persistence error");
            }
            AppError::Hashing(_) | AppError::Entropy(_) => {
                tracing::error!(error_id = error_id, error = %self, "Crypto primitive failure");
            }
            AppError::Config(e) => {
                tracing::error!(error_id = error_id, error = %e, "Configuration error");
            }
            AppError::Internal(msg) => {
                tracing::error!(error_id = error_id, error = %msg, "Internal error");
            }
        }
    }
}

/// Implement ResponseError for Actix-web integration
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let error_id = uuid::Uuid::new_v4().to_string();
        self.log_error(&error_id);

        let (status, body) = <Self as ErrorHandler>::error_response(self, &error_id);
        HttpResponse::build(status).json(body)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Persistence(StoreError::Timeout(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Persistence(_)
            | AppError::Hashing(_)
            | AppError::Entropy(_)
            | AppError::Config(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Rejection handler for `web::Json` extractors: missing fields and
/// unparseable bodies become a 400 with the standard error body.
pub fn json_error_handler(
    err: actix_web::error::JsonPayloadError,
    _req: &actix_web::HttpRequest,
) -> actix_web::Error {
    tracing::debug!(error = %err, "Rejected request body");
    AppError::Validation(ValidationError::MalformedBody).into()
}

// ============================================================================
// 4. ERROR CONTEXT ENRICHMENT
// ============================================================================

/// Operation context attached to failure logs
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub operation: &'static str,
    pub account_id: Option<uuid::Uuid>,
}

impl ErrorContext {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            account_id: None,
        }
    }

    pub fn with_account_id(mut self, account_id: uuid::Uuid) -> Self {
        self.account_id = Some(account_id);
        self
    }

    /// Log `error` with this context and hand it back for propagation.
    pub fn record(&self, error: AppError) -> AppError {
        let account_id = self.account_id.map(|id| id.to_string());
        match &error {
            AppError::Validation(_)
            | AppError::Auth(_)
            | AppError::Forbidden(_)
            | AppError::NotFound(_)
            | AppError::Conflict(_) => {
                tracing::warn!(
                    operation = self.operation,
                    account_id = ?account_id,
                    error = %error,
                    "Operation rejected"
                );
            }
            _ => {
                tracing::error!(
                    operation = self.operation,
                    account_id = ?account_id,
                    error = %error,
                    "Operation failed"
                );
            }
        }
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::EmptyField("email".to_string());
        assert_eq!(err.to_string(), "email is empty");
    }

    #[test]
    fn test_app_error_conversion() {
        let app_err: AppError = ValidationError::InvalidFormat("email".to_string()).into();
        match app_err {
            AppError::Validation(_) => (),
            _ => panic!("Expected Validation error"),
        }
    }

    #[test]
    fn test_status_mapping_follows_taxonomy() {
        let cases = vec![
            (AppError::Validation(ValidationError::MalformedBody), 400),
            (AppError::Auth(AuthError::InvalidCredentials), 401),
            (AppError::Auth(AuthError::TokenRevoked), 401),
            (AppError::Forbidden("chirp".to_string()), 403),
            (AppError::NotFound("Account".to_string()), 404),
            (AppError::Conflict("Email already registered".to_string()), 409),
            (AppError::Persistence(StoreError::Database("boom".to_string())), 500),
            (AppError::Persistence(StoreError::Timeout("find_refresh_token")), 503),
            (AppError::Hashing("cost".to_string()), 500),
            (AppError::Entropy("os rng".to_string()), 500),
        ];

        for (err, expected) in cases {
            assert_eq!(err.status_code().as_u16(), expected, "{:?}", err);
        }
    }

    #[test]
    fn test_server_faults_do_not_leak_detail() {
        let err = AppError::Persistence(StoreError::Database(
            "relation \"users\" does not exist".to_string(),
        ));
        let (status, body) = <AppError as ErrorHandler>::error_response(&err, "req-1");

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.code, "DATABASE_ERROR");
        assert!(!body.error.contains("relation"));
        assert_eq!(body.error_id, "req-1");
    }

    #[test]
    fn test_invalid_credentials_body() {
        let err = AppError::Auth(AuthError::InvalidCredentials);
        let (_, body) = <AppError as ErrorHandler>::error_response(&err, "req-2");

        assert_eq!(body.code, "INVALID_CREDENTIALS");
        assert_eq!(body.error, "Incorrect email or password");
    }

    #[test]
    fn test_error_context_keeps_error() {
        let account_id = uuid::Uuid::new_v4();
        let ctx = ErrorContext::new("refresh").with_account_id(account_id);
        assert_eq!(ctx.account_id, Some(account_id));

        let err = ctx.record(AppError::Auth(AuthError::TokenExpired));
        assert!(matches!(err, AppError::Auth(AuthError::TokenExpired)));
    }
}
