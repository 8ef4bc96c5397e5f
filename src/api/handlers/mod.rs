pub mod auth;
pub mod health;

use axum::{http::StatusCode, response::IntoResponse};
use serde_json::json;

// axum handler for the root banner
pub async fn root() -> impl IntoResponse {
    axum::Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Empty 200 for CORS preflight; the CORS layer attaches the headers.
pub async fn preflight() -> impl IntoResponse {
    StatusCode::OK
}
