pub mod api;
pub mod config;
pub mod error;
pub mod logic;
pub mod model;
pub mod store;

pub use api::routes;
pub use error::{ErrorClass, RegistryError, RegistryResult};
pub use logic::{Registry, RecoveryReport, RemoteLookup, ResolvedRef};
pub use model::*;
pub use store::{DatabaseStore, MemoryStore, PostgresStore};

use crate::config::{AppConfig, StoreBackend};
use log::info;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Router for `registry`, ready to serve.
pub fn build_app<S: DatabaseStore + 'static>(registry: Arc<Registry<S>>) -> axum::Router {
    crate::api::routes::create_router::<S>().with_state(registry)
}

/// Recover interrupted transitions, then serve until the listener closes.
pub async fn serve_registry<S: DatabaseStore + 'static>(
    store: S,
    config: &AppConfig,
) -> anyhow::Result<()> {
    let registry = Arc::new(Registry::with_lookup_timeout(
        Arc::new(store),
        config.registry.lookup_timeout(),
    ));

    let report = registry.recover().await?;
    info!(
        "Recovery: {} abandoned creations removed, {} deletions finished",
        report.abandoned_creations, report.finished_deletions
    );

    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;
    info!("Registry listening on http://{}", bind_address);

    axum::serve(listener, build_app(registry)).await?;
    Ok(())
}

/// Load configuration and serve with the configured backend.
pub async fn run_server() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;

    match config.registry.backend {
        StoreBackend::Memory => serve_registry(MemoryStore::new(), &config).await,
        StoreBackend::Postgres => {
            let database_url = config.database_url()?;
            let store =
                PostgresStore::new(&database_url, config.database.max_connections.unwrap_or(20))
                    .await?;
            store.migrate().await?;
            serve_registry(store, &config).await
        }
    }
}
