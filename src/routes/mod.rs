mod auth;
mod health_check;
mod users;
mod webhooks;

pub use auth::{login, refresh, revoke};
pub use health_check::health_check;
pub use users::{register, update_credentials};
pub use webhooks::polka_webhook;
