// src/server/routes.rs
//! Axum router configuration for the mdapi server

use crate::server::ServerState;
use crate::server::handlers::{branches, packages};
use crate::store::RelationKind;
use axum::{
    Router,
    extract::{Path, State},
    http::Method,
    routing::get,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the main application router
pub fn create_router(state: Arc<ServerState>) -> Router {
    // Read-only public API
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET]);

    let mut router = Router::new()
        .route("/branches", get(branches::list_branches))
        .route("/:branch/pkg/:name", get(packages::get_package))
        .route("/:branch/srcpkg/:name", get(packages::get_source_package))
        .route("/:branch/files/:name", get(packages::get_files))
        .route("/:branch/changelog/:name", get(packages::get_changelog));

    for kind in RelationKind::ALL {
        router = router.route(
            &format!("/:branch/{}/:token", kind.table()),
            get(
                move |State(state): State<Arc<ServerState>>,
                      Path((branch, token)): Path<(String, String)>| {
                    packages::get_by_relation(state, branch, token, kind)
                },
            ),
        );
    }

    router.with_state(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors),
    )
}
