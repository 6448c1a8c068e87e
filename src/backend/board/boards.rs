//! Board operations

use super::error::BoardError;
use super::service::BoardService;
use crate::shared::event::BoardChange;
use crate::shared::model::{
    AuditAction, AuditEntry, Board, BoardPatch, BoardSnapshot, Column, ColumnWithCards,
    EntityType, NewBoard, DEFAULT_BOARD_COLOR, DEFAULT_COLUMNS,
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

/// Upper bound on audit entries returned in one call
pub const AUDIT_PAGE_MAX: i64 = 500;

impl BoardService {
    /// Create a board with the default columns
    pub async fn create_board(
        &self,
        user_id: Uuid,
        request: NewBoard,
    ) -> Result<BoardSnapshot, BoardError> {
        request.validate()?;
        let now = Utc::now();
        let board = Board {
            id: Uuid::new_v4(),
            owner_id: user_id,
            title: request.title.trim().to_string(),
            description: request.description,
            background_color: request
                .background_color
                .unwrap_or_else(|| DEFAULT_BOARD_COLOR.to_string()),
            created_at: now,
            updated_at: now,
        };
        let columns: Vec<Column> = DEFAULT_COLUMNS
            .iter()
            .enumerate()
            .map(|(position, title)| Column {
                id: Uuid::new_v4(),
                board_id: board.id,
                title: title.to_string(),
                position: position as i32,
                created_at: now,
                updated_at: now,
                deleted_at: None,
            })
            .collect();

        let mut tx = self.store.begin().await?;
        tx.insert_board(&board).await?;
        for column in &columns {
            tx.insert_column(column).await?;
        }
        tx.commit().await?;

        tracing::info!("[Board] {} created board {}", user_id, board.id);
        self.audit(
            AuditEntry::new(
                AuditAction::BoardCreated,
                EntityType::Board,
                board.id,
                board.id,
                user_id,
            )
            .with_metadata(json!({ "title": board.title })),
        )
        .await;

        Ok(BoardSnapshot {
            board,
            columns: columns
                .into_iter()
                .map(|column| ColumnWithCards {
                    column,
                    cards: Vec::new(),
                })
                .collect(),
        })
    }

    /// Boards owned by the caller
    pub async fn list_boards(&self, user_id: Uuid) -> Result<Vec<Board>, BoardError> {
        Ok(self.store.boards_for_owner(user_id).await?)
    }

    /// Authoritative snapshot, the refresh path for clients
    pub async fn get_board(&self, user_id: Uuid, board_id: Uuid) -> Result<BoardSnapshot, BoardError> {
        let snapshot = self
            .store
            .snapshot(board_id)
            .await?
            .ok_or(BoardError::not_found(EntityType::Board, board_id))?;
        if !self.policy.can_access(user_id, &snapshot.board) {
            return Err(BoardError::not_found(EntityType::Board, board_id));
        }
        Ok(snapshot)
    }

    pub async fn update_board(
        &self,
        user_id: Uuid,
        board_id: Uuid,
        patch: BoardPatch,
    ) -> Result<Board, BoardError> {
        patch.validate()?;
        self.accessible_board(user_id, board_id).await?;

        let mut tx = self.store.begin().await?;
        let before = tx
            .lock_board(board_id)
            .await?
            .ok_or(BoardError::not_found(EntityType::Board, board_id))?;
        let mut board = before.clone();
        patch.apply_to(&mut board);
        board.updated_at = Utc::now();
        tx.update_board(&board).await?;
        tx.commit().await?;

        self.audit(
            AuditEntry::new(
                AuditAction::BoardUpdated,
                EntityType::Board,
                board_id,
                board_id,
                user_id,
            )
            .with_changes(json!({
                "before": {
                    "title": before.title,
                    "description": before.description,
                    "backgroundColor": before.background_color,
                },
                "after": {
                    "title": board.title,
                    "description": board.description,
                    "backgroundColor": board.background_color,
                },
            })),
        )
        .await;
        self.broadcast(
            board_id,
            user_id,
            BoardChange::BoardUpdated {
                board: board.clone(),
            },
        )
        .await;
        Ok(board)
    }

    /// Most recent audit entries of a board, newest first
    pub async fn audit_trail(
        &self,
        user_id: Uuid,
        board_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<AuditEntry>, BoardError> {
        self.accessible_board(user_id, board_id).await?;
        let limit = limit.unwrap_or(100).clamp(1, AUDIT_PAGE_MAX);
        Ok(self.store.audit_trail(board_id, limit).await?)
    }
}
