//! Realtime command handlers
//!
//! Commands are plain POSTs keyed by the connection id handed out in the
//! `connected` event. A connection id only works for the user who opened it.

use super::service::{RealtimeService, RoomRequest, TypingRequest};
use crate::backend::error::BackendError;
use crate::backend::middleware::AuthUser;
use crate::shared::event::PresenceUser;
use crate::shared::model::ApiResponse;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use uuid::Uuid;

pub async fn join_board(
    State(realtime): State<RealtimeService>,
    AuthUser(user): AuthUser,
    Path(connection_id): Path<Uuid>,
    payload: Result<Json<RoomRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Vec<PresenceUser>>>, BackendError> {
    let Json(request) = payload?;
    let users = realtime
        .join(connection_id, user.user_id, request.board_id)
        .await?;
    Ok(Json(ApiResponse::ok(users, "Joined board")))
}

pub async fn leave_board(
    State(realtime): State<RealtimeService>,
    AuthUser(user): AuthUser,
    Path(connection_id): Path<Uuid>,
    payload: Result<Json<RoomRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<()>>, BackendError> {
    let Json(request) = payload?;
    realtime
        .leave(connection_id, user.user_id, request.board_id)
        .await?;
    Ok(Json(ApiResponse::done("Left board")))
}

pub async fn typing(
    State(realtime): State<RealtimeService>,
    AuthUser(user): AuthUser,
    Path(connection_id): Path<Uuid>,
    payload: Result<Json<TypingRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<()>>, BackendError> {
    let Json(request) = payload?;
    realtime.typing(connection_id, user.user_id, request).await?;
    Ok(Json(ApiResponse::done("Typing state updated")))
}

pub async fn ping(
    State(realtime): State<RealtimeService>,
    AuthUser(user): AuthUser,
    Path(connection_id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, BackendError> {
    realtime.ping(connection_id, user.user_id).await?;
    Ok(Json(ApiResponse::done("pong")))
}
