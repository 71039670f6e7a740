//! API layer - HTTP handlers and routing
//!
//! A small router over the host:
//! - `GET /health` - liveness and registered plugins
//! - `GET /api/v1/mysql/pools` - status of every registered pool
//!
//! Handlers read the host through request extensions, so the router must be
//! wrapped with [`Server::attach`] (done by [`Server::serve`]).

pub mod error;
pub mod pools;

use axum::{extract::Extension, routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use crate::host::Server;

pub use error::{ApiError, ApiErrorDetail};

/// Build the API router
pub fn build_api_router() -> Router {
    Router::new().route("/mysql/pools", get(pools::list_pools))
}

/// Build the complete router with middleware
pub fn build_router() -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", build_api_router())
        .layer(TraceLayer::new_for_http())
}

/// GET /health
async fn health(Extension(server): Extension<Server>) -> Json<Value> {
    let plugins: Vec<Value> = server
        .registrations()
        .into_iter()
        .map(|r| json!({ "name": r.name, "version": r.version }))
        .collect();

    Json(json!({
        "status": if server.is_stopped() { "stopping" } else { "ok" },
        "plugins": plugins,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum_test::TestServer;

    #[tokio::test]
    async fn test_health_lists_registrations() {
        let server = Server::new();
        let client = TestServer::new(server.attach(build_router())).unwrap();

        let body: Value = client.get("/health").await.json();

        assert_eq!(body["status"], "ok");
        assert_eq!(body["plugins"], json!([]));
    }
}
