use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use timetabler::api::router;
use timetabler::config::AppConfig;
use timetabler::db;
use timetabler::notify::{LogNotifier, Notifier, WebhookNotifier};
use timetabler::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "timetabler=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    let pool = db::connect(&config.database_url, config.max_connections).await?;
    if config.seed_demo_data {
        db::seed_demo_data(&db::SqliteStore::new(pool.clone())).await?;
    }

    let notifier: Arc<dyn Notifier> = match config.webhook.clone() {
        Some(webhook) => {
            info!("delivering notifications to {}", webhook.url);
            Arc::new(WebhookNotifier::new(webhook)?)
        }
        None => Arc::new(LogNotifier),
    };

    let app = router(AppState::new(pool, notifier));

    info!("listening on http://{}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
