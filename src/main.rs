use std::time::Duration;

mod app;
mod auth;
mod config;
mod diagnosis;
mod error;
mod health;
mod notifications;
mod profile;
mod saved;
mod state;
#[cfg(test)]
mod test_support;

use crate::config::AppConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "nurture=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env()?;
    tracing::info!(env = ?config.environment, "configuration loaded");
    let app_state = AppState::init(config).await?;

    sqlx::migrate!("./migrations").run(&app_state.db).await?;

    notifications::spawn_expiry_sweeper(
        app_state.db.clone(),
        Duration::from_secs(app_state.config.notification_sweep_secs),
    );

    let config = app_state.config.clone();
    app::serve(app::build_app(app_state), &config).await
}
