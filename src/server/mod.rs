// src/server/mod.rs
//! mdapi HTTP server
//!
//! Read-only JSON API over the installed snapshots:
//! - `/branches` lists installed branches
//! - `/{branch}/pkg/{name}` and `/{branch}/srcpkg/{name}` look packages up
//! - `/{branch}/{relation}/{token}` finds packages by dependency
//! - `/{branch}/files/{name}` and `/{branch}/changelog/{name}` read the
//!   sibling databases of the resolved variant

mod handlers;
mod routes;

pub use routes::create_router;

use crate::config::Config;
use crate::store::SnapshotStore;
use anyhow::{Context, Result};
use std::sync::Arc;

/// Shared server state
pub struct ServerState {
    pub store: SnapshotStore,
}

impl ServerState {
    pub fn new(config: &Config) -> Self {
        Self {
            store: SnapshotStore::new(config),
        }
    }
}

/// Start the mdapi server
pub async fn run_server(config: Config) -> Result<()> {
    let bind_addr = config.bind_addr()?;
    tracing::info!("Starting mdapi server on {}", bind_addr);
    tracing::info!("Database folder: {}", config.db_folder.display());

    let state = Arc::new(ServerState::new(&config));
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    tracing::info!("mdapi is ready to serve");

    axum::serve(listener, app).await?;
    Ok(())
}
