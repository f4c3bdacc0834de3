// src/server/handlers/mod.rs
//! HTTP request handlers for the mdapi server
//!
//! Every handler does its SQLite work inside [`blocking`], so a slow read
//! only ties up a blocking-pool thread. Error bodies are generic; the
//! details only go to the log.

pub mod branches;
pub mod packages;

use crate::error::Error;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Run store work on the blocking pool and turn the outcome into a response
pub(crate) async fn blocking<T, F>(what: &'static str, f: F) -> Response
where
    F: FnOnce() -> crate::Result<T> + Send + 'static,
    T: Serialize + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(Ok(body)) => Json(body).into_response(),
        Ok(Err(err)) => error_response(what, &err),
        Err(err) => {
            tracing::error!("{} task failed: {}", what, err);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}

/// Map store errors onto status codes
fn error_response(what: &str, err: &Error) -> Response {
    match err {
        Error::UnknownBranch(_) | Error::MissingSnapshot(_) => {
            tracing::debug!("{}: {}", what, err);
            (StatusCode::BAD_REQUEST, "Bad Request").into_response()
        }
        Error::NotFound(_) => {
            tracing::debug!("{}: {}", what, err);
            (StatusCode::NOT_FOUND, "Not Found").into_response()
        }
        _ => {
            tracing::error!("{} failed: {}", what, err);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}
