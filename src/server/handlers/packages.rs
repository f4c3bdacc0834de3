// src/server/handlers/packages.rs
//! Package, relation, file list and changelog endpoints
//!
//! Each request resolves its branch to one variant first; everything else in
//! the response is read from that same variant.

use super::blocking;
use crate::error::Error;
use crate::server::ServerState;
use crate::store::{PackageQuery, PackageRecord, RelationKind};
use axum::{
    extract::{Path, State},
    response::Response,
};
use std::sync::Arc;

/// GET /:branch/pkg/:name
///
/// Newest package called `name`, with relations and co-packages.
pub async fn get_package(
    State(state): State<Arc<ServerState>>,
    Path((branch, name)): Path<(String, String)>,
) -> Response {
    tracing::info!("get_pkg {}/{}", branch, name);
    blocking("get_pkg", move || {
        let (snapshot, packages) = state.store.resolve(&branch, &PackageQuery::ByName(name))?;
        first(snapshot.expand(std::slice::from_ref(first_of(&packages)?))?)
    })
    .await
}

/// GET /:branch/srcpkg/:name
///
/// A package built from the source package `name`.
pub async fn get_source_package(
    State(state): State<Arc<ServerState>>,
    Path((branch, name)): Path<(String, String)>,
) -> Response {
    tracing::info!("get_src_pkg {}/{}", branch, name);
    blocking("get_src_pkg", move || {
        let (snapshot, packages) = state.store.resolve(&branch, &PackageQuery::BySource(name))?;
        first(snapshot.expand(std::slice::from_ref(first_of(&packages)?))?)
    })
    .await
}

/// GET /:branch/{provides,requires,...}/:token
///
/// Every package of the resolved variant whose `kind` table names `token`.
pub async fn get_by_relation(
    state: Arc<ServerState>,
    branch: String,
    token: String,
    kind: RelationKind,
) -> Response {
    tracing::info!("process_dep {} {}/{}", kind, branch, token);
    blocking("process_dep", move || {
        let (snapshot, packages) = state
            .store
            .resolve(&branch, &PackageQuery::ByRelation(kind, token))?;
        snapshot.expand(&packages)
    })
    .await
}

/// GET /:branch/files/:name
pub async fn get_files(
    State(state): State<Arc<ServerState>>,
    Path((branch, name)): Path<(String, String)>,
) -> Response {
    tracing::info!("get_pkg_files {}/{}", branch, name);
    blocking("get_pkg_files", move || {
        let (snapshot, packages) = state.store.resolve(&branch, &PackageQuery::ByName(name))?;
        snapshot.files(first_of(&packages)?)
    })
    .await
}

/// GET /:branch/changelog/:name
pub async fn get_changelog(
    State(state): State<Arc<ServerState>>,
    Path((branch, name)): Path<(String, String)>,
) -> Response {
    tracing::info!("get_pkg_changelog {}/{}", branch, name);
    blocking("get_pkg_changelog", move || {
        let (snapshot, packages) = state.store.resolve(&branch, &PackageQuery::ByName(name))?;
        snapshot.changelog(first_of(&packages)?)
    })
    .await
}

fn first_of(packages: &[PackageRecord]) -> crate::Result<&PackageRecord> {
    packages
        .first()
        .ok_or_else(|| Error::NotFound("no package".to_string()))
}

fn first<T>(items: Vec<T>) -> crate::Result<T> {
    items
        .into_iter()
        .next()
        .ok_or_else(|| Error::NotFound("empty expansion".to_string()))
}
