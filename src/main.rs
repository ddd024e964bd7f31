//! Storefront Checkout - order placement and VNPay reconciliation service

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_checkout::config::AppConfig;
use storefront_checkout::http::{router, AppState};
use storefront_checkout::messaging::EventPublisher;
use storefront_checkout::store::PgStore;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();

    let config = AppConfig::from_env()?;
    let db = PgPoolOptions::new().max_connections(10).connect(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let nats = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!(error = %e, "NATS unavailable, domain events will only be logged");
                None
            }
        },
        None => None,
    };

    let state = AppState::new(Arc::new(PgStore::new(db)), &config, EventPublisher::new(nats))?;
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(gateway = ?config.gateway, "storefront checkout listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
