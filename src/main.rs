use movie_tracker::{shell, telemetry, AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    telemetry::init(&config.log_filter);

    let app = AppState::from_config(&config);
    let background = app.start().await?;
    tracing::info!(
        store = %config.store_url,
        debounce_ms = config.search_debounce_ms,
        "Watchlist client started"
    );

    shell::run(&app).await?;

    background.stop();
    Ok(())
}
