use actix_web::web;
use std::net::TcpListener;

use chirpy::configuration::get_configuration;
use chirpy::session::SessionManager;
use chirpy::startup::{build_store, run, spawn_expired_token_sweeper};
use chirpy::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!(backend = ?config.database.backend, "Configuration loaded");
            config
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to read configuration");
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    let store = build_store(&configuration.database, configuration.auth.store_timeout())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to initialise store");
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "Store error")
        })?;

    let sessions = web::Data::new(SessionManager::new(store, configuration.auth.clone()));
    spawn_expired_token_sweeper(
        sessions.clone(),
        configuration.auth.expired_token_sweep_interval_secs,
    );

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!(address = %address, "Server listening");

    let server = run(listener, sessions, configuration.webhooks.clone())?;
    server.await
}
