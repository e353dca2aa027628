//! Board Game Forum server

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use boardgameforum::{
    api::{self, AppState},
    config::Config,
    db::{self, repositories::SqlxTokenRepository},
    services::{TokenService, UserService},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "boardgameforum=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Board Game Forum...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Build application state
    let state = AppState::new(pool.clone(), &config)?;
    state.images.ensure_defaults()?;
    tracing::info!("Templates loaded, overrides from {:?}", config.theme.path);

    // Purge expired sessions and tokens
    spawn_cleanup_task(
        state.user_service.clone(),
        Arc::new(TokenService::new(SqlxTokenRepository::boxed(pool))),
        Duration::from_secs(config.session.cleanup_interval_secs.max(1)),
    );

    // Build router
    let app = api::build_router(state, &config.upload);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn spawn_cleanup_task(users: Arc<UserService>, tokens: Arc<TokenService>, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;

            match users.cleanup_expired_sessions().await {
                Ok(0) => {}
                Ok(n) => tracing::info!("Purged {} expired sessions", n),
                Err(e) => tracing::warn!("Session cleanup failed: {}", e),
            }
            match tokens.purge_expired().await {
                Ok(0) => {}
                Ok(n) => tracing::info!("Purged {} expired tokens", n),
                Err(e) => tracing::warn!("Token cleanup failed: {}", e),
            }
        }
    });
}
