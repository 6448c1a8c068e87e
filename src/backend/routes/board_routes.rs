/**
 * Board Route Handlers
 *
 * # Routes
 *
 * ## Boards
 * - `POST /api/boards` - Create a board with its default columns
 * - `GET /api/boards` - Boards owned by the caller
 * - `GET /api/boards/{board_id}` - Full snapshot, the client's refresh path
 * - `PUT /api/boards/{board_id}` - Update title, description or color
 * - `GET /api/boards/{board_id}/audit` - Audit trail, newest first
 * - `PUT /api/boards/{board_id}/columns/order` - Reorder columns
 *
 * ## Columns
 * - `POST /api/columns`, `PUT /api/columns/{column_id}`, `DELETE /api/columns/{column_id}`
 *
 * ## Cards
 * - `POST /api/cards`, `PUT /api/cards/{card_id}`, `DELETE /api/cards/{card_id}`
 * - `POST /api/cards/move` - Move a card within or across columns
 */

use crate::backend::board::handlers;
use crate::backend::server::state::AppState;
use axum::routing::{get, post, put};
use axum::Router;

/// Configure board, column and card routes
pub fn configure_board_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route(
            "/api/boards",
            post(handlers::create_board).get(handlers::list_boards),
        )
        .route(
            "/api/boards/{board_id}",
            get(handlers::get_board).put(handlers::update_board),
        )
        .route("/api/boards/{board_id}/audit", get(handlers::audit_trail))
        .route(
            "/api/boards/{board_id}/columns/order",
            put(handlers::reorder_columns),
        )
        .route("/api/columns", post(handlers::create_column))
        .route(
            "/api/columns/{column_id}",
            put(handlers::rename_column).delete(handlers::delete_column),
        )
        .route("/api/cards", post(handlers::create_card))
        .route("/api/cards/move", post(handlers::move_card))
        .route(
            "/api/cards/{card_id}",
            put(handlers::update_card).delete(handlers::delete_card),
        )
}
