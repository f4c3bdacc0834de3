// src/server/handlers/branches.rs
//! Branch listing endpoint

use super::blocking;
use crate::server::ServerState;
use axum::{extract::State, response::Response};
use std::sync::Arc;

/// GET /branches
///
/// Sorted names of every branch with at least one installed database.
pub async fn list_branches(State(state): State<Arc<ServerState>>) -> Response {
    tracing::info!("list_branches");
    blocking("list_branches", move || state.store.branches()).await
}
