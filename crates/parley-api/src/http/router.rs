//! Axum router configuration with middleware.
//!
//! REST routes are under `/api/v1/`; the gateway socket is `/ws`.
//! Middleware: CORS, tracing.

use axum::Router;
use axum::routing::{delete, get};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // History and search
        .route("/messages", get(handlers::message::history))
        .route("/messages/search", get(handlers::message::search))
        // Administrative deletion
        .route("/messages/public", delete(handlers::message::delete_public))
        .route("/messages/{id}", delete(handlers::message::delete_message))
        // Presence
        .route("/presence", get(handlers::presence::online_users));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/ws", get(handlers::ws::ws_handler))
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Simple health check endpoint (no auth required).
async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "connections": state.transport.connection_count(),
        "online": state.gateway.registry().len(),
    }))
}
