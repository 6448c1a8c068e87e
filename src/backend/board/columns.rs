//! Column operations
//!
//! Column order is board-scoped, so everything that re-derives it locks the
//! board row first. Renames only touch the column row.

use super::error::BoardError;
use super::service::BoardService;
use crate::shared::event::BoardChange;
use crate::shared::ledger;
use crate::shared::model::{
    AuditAction, AuditEntry, Column, EntityType, NewColumn, RenameColumn, ReorderColumns,
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

impl BoardService {
    /// Append a column at the end of a board
    pub async fn create_column(&self, user_id: Uuid, request: NewColumn) -> Result<Column, BoardError> {
        let board_id = request.validate()?;
        self.accessible_board(user_id, board_id).await?;

        let mut tx = self.store.begin().await?;
        tx.lock_board(board_id)
            .await?
            .ok_or(BoardError::not_found(EntityType::Board, board_id))?;
        let existing = tx.board_columns(board_id).await?;
        let now = Utc::now();
        let column = Column {
            id: Uuid::new_v4(),
            board_id,
            title: request.title.trim().to_string(),
            position: ledger::append_position(existing.len() as i64),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        tx.insert_column(&column).await?;
        tx.commit().await?;

        self.audit(
            AuditEntry::new(
                AuditAction::ColumnCreated,
                EntityType::Column,
                column.id,
                board_id,
                user_id,
            )
            .with_metadata(json!({ "title": column.title, "position": column.position })),
        )
        .await;
        self.broadcast(
            board_id,
            user_id,
            BoardChange::ColumnCreated {
                column: column.clone(),
            },
        )
        .await;
        Ok(column)
    }

    pub async fn rename_column(
        &self,
        user_id: Uuid,
        column_id: Uuid,
        request: RenameColumn,
    ) -> Result<Column, BoardError> {
        request.validate()?;
        self.accessible_column(user_id, column_id).await?;

        let mut tx = self.store.begin().await?;
        let mut column = tx
            .lock_column(column_id)
            .await?
            .ok_or(BoardError::not_found(EntityType::Column, column_id))?;
        let before = std::mem::replace(&mut column.title, request.title.trim().to_string());
        column.updated_at = Utc::now();
        tx.update_column(&column).await?;
        tx.commit().await?;

        self.audit(
            AuditEntry::new(
                AuditAction::ColumnUpdated,
                EntityType::Column,
                column_id,
                column.board_id,
                user_id,
            )
            .with_changes(json!({
                "before": { "title": before },
                "after": { "title": column.title },
            })),
        )
        .await;
        self.broadcast(
            column.board_id,
            user_id,
            BoardChange::ColumnUpdated {
                column: column.clone(),
            },
        )
        .await;
        Ok(column)
    }

    /// Soft-delete a column and its cards, then close the gap in the board's
    /// column order
    pub async fn delete_column(&self, user_id: Uuid, column_id: Uuid) -> Result<(), BoardError> {
        let (_, board) = self.accessible_column(user_id, column_id).await?;

        let mut tx = self.store.begin().await?;
        tx.lock_board(board.id)
            .await?
            .ok_or(BoardError::not_found(EntityType::Board, board.id))?;
        let mut column = tx
            .lock_column(column_id)
            .await?
            .ok_or(BoardError::not_found(EntityType::Column, column_id))?;
        let order: Vec<Uuid> = tx
            .board_columns(board.id)
            .await?
            .iter()
            .map(|c| c.id)
            .collect();
        let remaining = ledger::close_gap(&order, column_id)
            .ok_or(BoardError::not_found(EntityType::Column, column_id))?;

        let now = Utc::now();
        let cards_deleted = tx.delete_column_cards(column_id, now).await?;
        column.deleted_at = Some(now);
        column.updated_at = now;
        tx.update_column(&column).await?;
        tx.apply_column_order(&remaining, now).await?;
        tx.commit().await?;

        tracing::info!(
            "[Board] {} deleted column {} ({} card(s))",
            user_id,
            column_id,
            cards_deleted
        );
        self.audit(
            AuditEntry::new(
                AuditAction::ColumnDeleted,
                EntityType::Column,
                column_id,
                board.id,
                user_id,
            )
            .with_metadata(json!({ "title": column.title, "cardsDeleted": cards_deleted })),
        )
        .await;
        self.broadcast(
            board.id,
            user_id,
            BoardChange::ColumnDeleted {
                column_id,
                column_ids: remaining,
            },
        )
        .await;
        Ok(())
    }

    /// Replace the column order of a board. The request must list every live
    /// column exactly once.
    pub async fn reorder_columns(
        &self,
        user_id: Uuid,
        board_id: Uuid,
        request: ReorderColumns,
    ) -> Result<Vec<Uuid>, BoardError> {
        self.accessible_board(user_id, board_id).await?;

        let mut tx = self.store.begin().await?;
        tx.lock_board(board_id)
            .await?
            .ok_or(BoardError::not_found(EntityType::Board, board_id))?;
        let current: Vec<Uuid> = tx
            .board_columns(board_id)
            .await?
            .iter()
            .map(|c| c.id)
            .collect();
        let order = ledger::reorder_columns(&current, &request.column_ids)?;
        if order == current {
            tx.rollback().await?;
            return Ok(order);
        }
        tx.apply_column_order(&order, Utc::now()).await?;
        tx.commit().await?;

        self.audit(
            AuditEntry::new(
                AuditAction::ColumnsReordered,
                EntityType::Board,
                board_id,
                board_id,
                user_id,
            )
            .with_changes(json!({ "from": current, "to": order })),
        )
        .await;
        self.broadcast(
            board_id,
            user_id,
            BoardChange::ColumnsReordered {
                column_ids: order.clone(),
            },
        )
        .await;
        Ok(order)
    }
}
