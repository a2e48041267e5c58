use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};

use pathfinder_core::config::PostgresConfig;

/// Create a PostgreSQL connection pool and run migrations.
/// Returns None if DATABASE_URL is not configured or unreachable.
pub async fn init_pg_pool(config: &PostgresConfig) -> Option<PgPool> {
    let url = match config.url.as_deref() {
        Some(url) if config.is_configured() => url,
        _ => {
            warn!("DATABASE_URL not configured, using in-memory backends");
            return None;
        }
    };

    let pool = match PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            warn!("Failed to connect to PostgreSQL: {}, using in-memory backends", e);
            return None;
        }
    };
    info!("PostgreSQL connected");

    match sqlx::migrate!("../../migrations").run(&pool).await {
        Ok(_) => {
            info!("Database migrations applied successfully");
            Some(pool)
        }
        Err(e) => {
            warn!("Failed to run migrations: {}, using in-memory backends", e);
            None
        }
    }
}
