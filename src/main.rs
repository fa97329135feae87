use std::sync::Arc;

use reviewer_assigner::api::{self, AppState};
use reviewer_assigner::config::Config;
use reviewer_assigner::services::ReviewerSelector;
use reviewer_assigner::{db, server};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;
    log::info!("Starting reviewer-assigner ({})", config.env);

    let pool = db::connect_with_retry(
        &config.database_path,
        config.db_connect_attempts,
        config.db_connect_backoff,
    )
    .await?;

    let state = AppState::new(
        db::sqlite_storage(pool.clone()),
        Arc::new(ReviewerSelector::from_entropy()),
    );
    let app = api::router(state, config.http_timeout);

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        signal_token.cancel();
    });

    server::serve(config.http_address, app, shutdown).await?;

    pool.close().await;
    log::info!("Database closed");
    Ok(())
}
