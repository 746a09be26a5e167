//! Service entry point: config from the environment, tracing, storage
//! pool + migrations, optional NATS, then the HTTP server.

use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tienda::api::{self, AppState};
use tienda::store::{PgStore, Store};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = std::env::var("DATABASE_URL")?;
    let store = PgStore::connect(&database_url).await?;
    store.migrate().await?;

    let nats = match std::env::var("NATS_URL") {
        Ok(url) => match async_nats::connect(&url).await {
            Ok(client) => Some(client),
            Err(err) => {
                tracing::warn!(%err, "NATS unavailable, domain events disabled");
                None
            }
        },
        Err(_) => None,
    };

    let store: Arc<dyn Store> = Arc::new(store);
    let app = api::router(AppState::new(store, nats));

    let port = std::env::var("PORT").unwrap_or_else(|_| "8083".to_string());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    tracing::info!("tienda listening on 0.0.0.0:{port}");
    axum::serve(listener, app).await?;
    Ok(())
}
