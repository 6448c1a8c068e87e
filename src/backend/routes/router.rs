/**
 * Router Configuration
 *
 * Combines the route groups into one router.
 *
 * # Layers
 *
 * Everything under `/api` sits behind `auth_middleware`, attached with
 * `route_layer` so unknown paths still fall through to the 404 fallback
 * instead of answering 401. `/health` is public. Tracing and CORS wrap the
 * whole router.
 */

use crate::backend::middleware::auth_middleware;
use crate::backend::routes::board_routes::configure_board_routes;
use crate::backend::routes::realtime_routes::configure_realtime_routes;
use crate::backend::server::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "connections": state.realtime.hub().connection_count().await,
    }))
}

/// Create the Axum router with all routes configured
pub fn create_router(app_state: AppState) -> Router<()> {
    let api = configure_realtime_routes(configure_board_routes(Router::new()))
        .route_layer(from_fn_with_state(app_state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(health))
        .merge(api)
        .fallback(|| async { (StatusCode::NOT_FOUND, "404 Not Found") })
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}
