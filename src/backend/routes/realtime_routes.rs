/**
 * Realtime Route Handlers
 *
 * - `GET /api/realtime` - Open the SSE stream; the first event is `connected`
 * - `POST /api/realtime/{connection_id}/join` - Join a board room
 * - `POST /api/realtime/{connection_id}/leave` - Leave a board room
 * - `POST /api/realtime/{connection_id}/typing` - Start or stop typing on a card
 * - `POST /api/realtime/{connection_id}/ping` - Heartbeat, answered with `pong`
 */

use crate::backend::realtime::{handle_realtime_connection, handlers};
use crate::backend::server::state::AppState;
use axum::routing::{get, post};
use axum::Router;

/// Configure the realtime stream and its commands
pub fn configure_realtime_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/api/realtime", get(handle_realtime_connection))
        .route("/api/realtime/{connection_id}/join", post(handlers::join_board))
        .route("/api/realtime/{connection_id}/leave", post(handlers::leave_board))
        .route("/api/realtime/{connection_id}/typing", post(handlers::typing))
        .route("/api/realtime/{connection_id}/ping", post(handlers::ping))
}
