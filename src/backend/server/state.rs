/**
 * Application State Management
 *
 * `AppState` is the single router state. Handlers extract the part they
 * need through the `FromRef` implementations below, e.g.
 * `State(boards): State<BoardService>`.
 *
 * # Thread Safety
 *
 * Every field is cheap to clone and shares its internals through `Arc`:
 * the store and lease store are trait objects behind `Arc`, and the room
 * hub keeps its maps behind `Arc<RwLock<>>`.
 */

use crate::backend::auth::JwtKeys;
use crate::backend::board::BoardService;
use crate::backend::realtime::RealtimeService;
use crate::backend::server::config::ServerConfig;
use axum::extract::FromRef;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    /// Resolved configuration
    pub config: Arc<ServerConfig>,

    /// Board, column and card operations
    pub boards: BoardService,

    /// Connections, rooms and presence
    pub realtime: RealtimeService,

    /// Token verification keys
    pub jwt: Arc<JwtKeys>,
}

impl FromRef<AppState> for BoardService {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.boards.clone()
    }
}

impl FromRef<AppState> for RealtimeService {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.realtime.clone()
    }
}

impl FromRef<AppState> for Arc<JwtKeys> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.jwt.clone()
    }
}
