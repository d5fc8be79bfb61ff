//! Health endpoint
//!
//! Always 200; the dependency verdict lives in the JSON body.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};

use crate::AppState;
use crate::health::HealthCheck;

pub fn health_router() -> Router<AppState> {
    Router::new().route("/health", get(health_handler))
}

async fn health_handler(State(state): State<AppState>) -> Response {
    report(state.health.as_ref()).await
}

async fn report(check: &dyn HealthCheck) -> Response {
    (StatusCode::OK, Json(check.check().await)).into_response()
}
