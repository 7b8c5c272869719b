/// Session Routes
///
/// Login, access token refresh, and refresh token revocation.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::extract_bearer_token;
use crate::error::AppError;
use crate::session::SessionManager;
use crate::store::AccountView;

/// Login request
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Public account fields plus the new session's tokens
#[derive(Serialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub account: AccountView,
    pub token: String,
    pub refresh_token: String,
}

/// Fresh access token
#[derive(Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// POST /login
///
/// # Errors
/// - 400: Malformed body
/// - 401: Unknown email or wrong password (same response for both)
/// - 500/503: Store or crypto failure
pub async fn login(
    form: web::Json<LoginRequest>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let outcome = sessions.login(&form.email, &form.password).await?;

    Ok(HttpResponse::Ok().json(LoginResponse {
        account: AccountView::from(&outcome.account),
        token: outcome.access_token,
        refresh_token: outcome.refresh_token,
    }))
}

/// POST /refresh with `Authorization: Bearer <refresh token>`
///
/// # Errors
/// - 401: Missing header, unknown, revoked, or expired refresh token
pub async fn refresh(
    req: HttpRequest,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let refresh_token = extract_bearer_token(req.headers())?;
    let token = sessions.refresh(&refresh_token).await?;

    Ok(HttpResponse::Ok().json(TokenResponse { token }))
}

/// POST /revoke with `Authorization: Bearer <refresh token>`
///
/// Revoking an already revoked token is a success.
///
/// # Errors
/// - 401: Missing header or unknown refresh token
pub async fn revoke(
    req: HttpRequest,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let refresh_token = extract_bearer_token(req.headers())?;
    sessions.revoke(&refresh_token).await?;

    Ok(HttpResponse::NoContent().finish())
}
