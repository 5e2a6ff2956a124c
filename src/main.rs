use tracing_subscriber::EnvFilter;

use marketplace::config::AppConfig;
use marketplace::db;
use marketplace::routes;
use marketplace::services::notify::webhook::WebhookNotifier;
use marketplace::services::notify::{NoopNotifier, Notifier};
use marketplace::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    if config.session_secret == "changeme" {
        tracing::warn!("SESSION_SECRET is not set; using the development default");
    }

    let conn = db::init_db(&config.database_url)?;

    let notifier: Box<dyn Notifier> = match &config.notify_webhook_url {
        Some(url) => {
            tracing::info!("delivering booking events to webhook (url: {url})");
            Box::new(WebhookNotifier::new(
                url.clone(),
                config.notify_webhook_secret.clone(),
            ))
        }
        None => {
            tracing::info!("no NOTIFY_WEBHOOK_URL set; booking events are streamed only");
            Box::new(NoopNotifier)
        }
    };

    let port = config.port;
    let state = AppState::new(conn, config, notifier);
    let app = routes::app(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
