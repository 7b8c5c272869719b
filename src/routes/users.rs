/// Account Routes

use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::error::AppError;
use crate::middleware::AuthenticatedAccount;
use crate::session::SessionManager;
use crate::store::AccountView;

#[derive(Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

/// POST /users
///
/// # Errors
/// - 400: Invalid email or password
/// - 409: Email already registered
pub async fn register(
    form: web::Json<CredentialsRequest>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let account = sessions.register(&form.email, &form.password).await?;
    Ok(HttpResponse::Created().json(AccountView::from(&account)))
}

/// PUT /users, behind the access token middleware
///
/// Replaces both email and password of the token's account.
///
/// # Errors
/// - 400: Invalid email or password
/// - 401: Missing or invalid access token
/// - 409: Email belongs to another account
pub async fn update_credentials(
    form: web::Json<CredentialsRequest>,
    account: web::ReqData<AuthenticatedAccount>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let AuthenticatedAccount(account_id) = account.into_inner();
    let account = sessions
        .update_credentials(account_id, &form.email, &form.password)
        .await?;

    Ok(HttpResponse::Ok().json(AccountView::from(&account)))
}
