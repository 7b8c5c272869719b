use actix_web::dev::Server;
use actix_web::{guard, web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use crate::configuration::{DatabaseSettings, StoreBackend, WebhookSettings};
use crate::error::json_error_handler;
use crate::logger::LoggerMiddleware;
use crate::middleware::JwtMiddleware;
use crate::routes::{
    health_check, login, polka_webhook, refresh, register, revoke, update_credentials,
};
use crate::session::SessionManager;
use crate::store::{AuthStore, InMemoryStore, PgStore, StoreError};

pub fn run(
    listener: TcpListener,
    sessions: web::Data<SessionManager>,
    webhooks: WebhookSettings,
) -> Result<Server, std::io::Error> {
    let webhooks = web::Data::new(webhooks);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(LoggerMiddleware)
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .app_data(sessions.clone())
            .app_data(webhooks.clone())
            .route("/health_check", web::get().to(health_check))
            .route("/login", web::post().to(login))
            .route("/refresh", web::post().to(refresh))
            .route("/revoke", web::post().to(revoke))
            .route("/webhooks/polka", web::post().to(polka_webhook))
            // Registration is public, credential changes need an access token
            .service(
                web::resource("/users")
                    .guard(guard::Post())
                    .route(web::post().to(register)),
            )
            .service(
                web::resource("/users")
                    .guard(guard::Put())
                    .route(web::put().to(update_credentials))
                    .wrap(JwtMiddleware::new(sessions.clone())),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}

/// Build the configured store. Postgres migrations run before returning.
pub async fn build_store(
    settings: &DatabaseSettings,
    acquire_timeout: Duration,
) -> Result<Arc<dyn AuthStore>, StoreError> {
    match settings.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on shutdown");
            Ok(Arc::new(InMemoryStore::new()))
        }
        StoreBackend::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(settings.max_connections)
                .acquire_timeout(acquire_timeout)
                .connect(&settings.connection_string())
                .await?;
            tracing::info!("Database connection pool created");

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(|e| StoreError::Database(e.to_string()))?;
            tracing::info!("Database migrations applied");

            Ok(Arc::new(PgStore::new(pool)))
        }
    }
}

/// Periodically delete expired refresh tokens. An interval of zero disables it.
pub fn spawn_expired_token_sweeper(
    sessions: web::Data<SessionManager>,
    interval_secs: u64,
) -> Option<tokio::task::JoinHandle<()>> {
    if interval_secs == 0 {
        return None;
    }

    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            // Failures are already logged by the session manager
            let _ = sessions.purge_expired_refresh_tokens().await;
        }
    }))
}
