use std::sync::Arc;

use plugwise_booking::config::{AppConfig, StoreBackend};
use plugwise_booking::infra::{db, memory::MemoryStore, postgres::PgStore, store::Store};
use plugwise_booking::{build_app, state::AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let store: Arc<dyn Store> = match &config.store {
        StoreBackend::Postgres {
            database_url,
            max_connections,
        } => {
            let pool = db::connect(database_url, *max_connections).await?;
            db::run_migrations(&pool).await?;
            Arc::new(PgStore::new(pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("using the in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };
    tracing::info!(backend = store.backend_tag(), "store ready");

    let app = build_app(AppState::new(store, config.security));

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
