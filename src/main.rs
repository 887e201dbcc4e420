use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use movie_ranker::{
    api::{create_router, AppState},
    config::{Config, StoreBackend},
    db::{self, InMemoryRatingStore, PgRatingStore, RatingStore},
    services::RatingService,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "movie_ranker=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let store: Arc<dyn RatingStore> = match config.store_backend {
        StoreBackend::Postgres => {
            let pool = db::create_pool(&config.database_url, config.database_max_connections)
                .await
                .context("Failed to connect to database")?;
            tracing::info!("Database connection established");
            db::run_migrations(&pool)
                .await
                .context("Failed to run migrations")?;
            Arc::new(PgRatingStore::new(pool))
        }
        StoreBackend::Memory => Arc::new(InMemoryRatingStore::new()),
    };

    tracing::info!(
        store = store.name(),
        k_factor = config.elo_k_factor,
        rank_retry_attempts = config.rank_retry_attempts,
        "Rating service configured"
    );

    let service = RatingService::new(store, config.rating_engine(), config.retry_policy());
    let app = create_router(AppState::new(service));

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    tracing::info!(address = %address, "Server running");
    axum::serve(listener, app).await?;

    Ok(())
}
