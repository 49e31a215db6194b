//! Admin API server: loads `.env`, builds the configuration, connects the pool when
//! credentials are present, mounts the common and admin routes.

use incubator_admin::{app, AdminConfig, AppState};
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("incubator_admin=info".parse()?))
        .init();

    let config = AdminConfig::from_env()?;
    let pool = match &config.database {
        Some(db) => Some(
            PgPoolOptions::new()
                .max_connections(db.pool_size)
                .acquire_timeout(db.acquire_timeout)
                .connect(&db.url)
                .await?,
        ),
        None => {
            tracing::warn!("DATABASE_URL not set; list endpoints answer with partial, empty results");
            None
        }
    };

    let listener = TcpListener::bind(&config.bind_addr).await?;
    let state = AppState::new(pool, config);
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app(state)).await?;
    Ok(())
}
