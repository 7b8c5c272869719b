/// Billing provider webhook

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{extract_api_key, token_digest};
use crate::configuration::WebhookSettings;
use crate::error::{AppError, AuthError};
use crate::session::SessionManager;

const USER_UPGRADED: &str = "user.upgraded";

// Compare digests, never the raw key
fn api_key_matches(presented: &str, expected: &str) -> bool {
    token_digest(presented) == token_digest(expected)
}

#[derive(Deserialize)]
pub struct PolkaEvent {
    pub event: String,
    pub data: PolkaEventData,
}

#[derive(Deserialize)]
pub struct PolkaEventData {
    pub user_id: Uuid,
}

/// POST /webhooks/polka with `Authorization: ApiKey <key>`
///
/// Only `user.upgraded` has an effect; other events are acknowledged.
///
/// # Errors
/// - 401: Missing or wrong API key
/// - 404: Upgraded account does not exist
pub async fn polka_webhook(
    req: HttpRequest,
    payload: web::Json<PolkaEvent>,
    webhooks: web::Data<WebhookSettings>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let api_key = extract_api_key(req.headers())?;
    if !api_key_matches(&api_key, &webhooks.polka_api_key) {
        tracing::warn!("Webhook called with wrong API key");
        return Err(AuthError::InvalidToken.into());
    }

    let event = payload.into_inner();
    if event.event != USER_UPGRADED {
        tracing::debug!(event = %event.event, "Ignoring webhook event");
        return Ok(HttpResponse::NoContent().finish());
    }

    sessions.grant_entitlement(event.data.user_id).await?;
    Ok(HttpResponse::NoContent().finish())
}
