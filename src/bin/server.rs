//! Entity query server. Uses PostgreSQL when `DATABASE_URL` is set, the in-memory store otherwise.

use entity_query::{
    app_router, builtin_catalog, ensure_entity_tables, load_from_path, AppState, EntityStore, HmacTokenSigner,
    InMemoryStore, PgStore, QueryEngine, Settings,
};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("entity_query=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    let catalog = Arc::new(match &settings.schema_path {
        Some(path) => load_from_path(path).await?,
        None => builtin_catalog()?,
    });
    tracing::info!(entities = catalog.entities().len(), "catalog loaded");

    let store: Arc<dyn EntityStore> = match &settings.database_url {
        Some(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(settings.database_max_connections)
                .connect(url)
                .await?;
            ensure_entity_tables(&pool, &catalog).await?;
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; records live in memory only");
            Arc::new(InMemoryStore::new(catalog.clone()))
        }
    };

    let ttl = settings.token_ttl_secs.map(chrono::Duration::seconds);
    let signer = Arc::new(HmacTokenSigner::new(settings.token_secret.as_bytes(), ttl));
    let state = AppState::new(QueryEngine::new(catalog), store, signer);
    let app = app_router(state, settings.body_limit_bytes);

    let listener = TcpListener::bind(settings.bind_addr).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
