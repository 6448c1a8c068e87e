//! Board HTTP Handlers
//!
//! Thin axum adapters over [`BoardService`]. Bodies are taken as
//! `Result<Json<T>, JsonRejection>` so malformed JSON comes back in the same
//! envelope as every other validation failure.

use super::service::BoardService;
use crate::backend::error::BackendError;
use crate::backend::middleware::AuthUser;
use crate::shared::model::{
    ApiResponse, AuditData, Board, BoardData, BoardList, BoardPatch, CardData, CardPatch,
    ColumnData, MoveCardRequest, NewBoard, NewCard, NewColumn, RenameColumn, ReorderColumns,
};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

type Created<T> = (StatusCode, Json<ApiResponse<T>>);

#[derive(Debug, Default, Deserialize)]
pub struct AuditQuery {
    pub limit: Option<i64>,
}

pub async fn create_board(
    State(boards): State<BoardService>,
    AuthUser(user): AuthUser,
    payload: Result<Json<NewBoard>, JsonRejection>,
) -> Result<Created<BoardData>, BackendError> {
    let Json(request) = payload?;
    let board = boards.create_board(user.user_id, request).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(BoardData { board }, "Board created successfully")),
    ))
}

pub async fn list_boards(
    State(boards): State<BoardService>,
    AuthUser(user): AuthUser,
) -> Result<Json<ApiResponse<BoardList>>, BackendError> {
    let boards = boards.list_boards(user.user_id).await?;
    Ok(Json(ApiResponse::ok(BoardList { boards }, "Boards retrieved")))
}

pub async fn get_board(
    State(boards): State<BoardService>,
    AuthUser(user): AuthUser,
    Path(board_id): Path<Uuid>,
) -> Result<Json<ApiResponse<BoardData>>, BackendError> {
    let board = boards.get_board(user.user_id, board_id).await?;
    Ok(Json(ApiResponse::ok(BoardData { board }, "Board retrieved")))
}

pub async fn update_board(
    State(boards): State<BoardService>,
    AuthUser(user): AuthUser,
    Path(board_id): Path<Uuid>,
    payload: Result<Json<BoardPatch>, JsonRejection>,
) -> Result<Json<ApiResponse<Board>>, BackendError> {
    let Json(patch) = payload?;
    let board = boards.update_board(user.user_id, board_id, patch).await?;
    Ok(Json(ApiResponse::ok(board, "Board updated successfully")))
}

pub async fn audit_trail(
    State(boards): State<BoardService>,
    AuthUser(user): AuthUser,
    Path(board_id): Path<Uuid>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<ApiResponse<AuditData>>, BackendError> {
    let entries = boards
        .audit_trail(user.user_id, board_id, query.limit)
        .await?;
    Ok(Json(ApiResponse::ok(AuditData { entries }, "Audit trail retrieved")))
}

pub async fn create_column(
    State(boards): State<BoardService>,
    AuthUser(user): AuthUser,
    payload: Result<Json<NewColumn>, JsonRejection>,
) -> Result<Created<ColumnData>, BackendError> {
    let Json(request) = payload?;
    let column = boards.create_column(user.user_id, request).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(ColumnData { column }, "Column created successfully")),
    ))
}

pub async fn rename_column(
    State(boards): State<BoardService>,
    AuthUser(user): AuthUser,
    Path(column_id): Path<Uuid>,
    payload: Result<Json<RenameColumn>, JsonRejection>,
) -> Result<Json<ApiResponse<ColumnData>>, BackendError> {
    let Json(request) = payload?;
    let column = boards
        .rename_column(user.user_id, column_id, request)
        .await?;
    Ok(Json(ApiResponse::ok(ColumnData { column }, "Column updated successfully")))
}

pub async fn delete_column(
    State(boards): State<BoardService>,
    AuthUser(user): AuthUser,
    Path(column_id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, BackendError> {
    boards.delete_column(user.user_id, column_id).await?;
    Ok(Json(ApiResponse::done("Column deleted successfully")))
}

pub async fn reorder_columns(
    State(boards): State<BoardService>,
    AuthUser(user): AuthUser,
    Path(board_id): Path<Uuid>,
    payload: Result<Json<ReorderColumns>, JsonRejection>,
) -> Result<Json<ApiResponse<ReorderColumns>>, BackendError> {
    let Json(request) = payload?;
    let column_ids = boards
        .reorder_columns(user.user_id, board_id, request)
        .await?;
    Ok(Json(ApiResponse::ok(
        ReorderColumns { column_ids },
        "Columns reordered successfully",
    )))
}

pub async fn create_card(
    State(boards): State<BoardService>,
    AuthUser(user): AuthUser,
    payload: Result<Json<NewCard>, JsonRejection>,
) -> Result<Created<CardData>, BackendError> {
    let Json(request) = payload?;
    let card = boards.create_card(user.user_id, request).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(CardData { card }, "Card created successfully")),
    ))
}

pub async fn update_card(
    State(boards): State<BoardService>,
    AuthUser(user): AuthUser,
    Path(card_id): Path<Uuid>,
    payload: Result<Json<CardPatch>, JsonRejection>,
) -> Result<Json<ApiResponse<CardData>>, BackendError> {
    let Json(patch) = payload?;
    let card = boards.update_card(user.user_id, card_id, patch).await?;
    Ok(Json(ApiResponse::ok(CardData { card }, "Card updated successfully")))
}

pub async fn move_card(
    State(boards): State<BoardService>,
    AuthUser(user): AuthUser,
    payload: Result<Json<MoveCardRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<CardData>>, BackendError> {
    let Json(request) = payload?;
    let report = boards.move_card(user.user_id, request).await?;
    let message = if report.changed {
        "Card moved successfully"
    } else {
        "Card already at requested position"
    };
    Ok(Json(ApiResponse::ok(CardData { card: report.card }, message)))
}

pub async fn delete_card(
    State(boards): State<BoardService>,
    AuthUser(user): AuthUser,
    Path(card_id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, BackendError> {
    boards.delete_card(user.user_id, card_id).await?;
    Ok(Json(ApiResponse::done("Card deleted successfully")))
}
