//! Board Service
//!
//! Owns the collaborators every board operation needs: the store, the lease
//! manager, the access policy and the room hub that fans committed changes
//! out to viewers. The operations themselves live in `boards`, `columns`,
//! `cards` and `coordinator`, each as an `impl BoardService` block.

use super::audit;
use super::error::BoardError;
use super::policy::AccessPolicy;
use crate::backend::locks::LockManager;
use crate::backend::realtime::hub::RoomHub;
use crate::backend::store::BoardStore;
use crate::shared::event::{BoardChange, ChangeEvent};
use crate::shared::model::{AuditEntry, Board, Card, Column, EntityType};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct BoardService {
    pub(super) store: Arc<dyn BoardStore>,
    pub(super) locks: LockManager,
    pub(super) policy: Arc<dyn AccessPolicy>,
    pub(super) hub: RoomHub,
}

impl BoardService {
    pub fn new(
        store: Arc<dyn BoardStore>,
        locks: LockManager,
        policy: Arc<dyn AccessPolicy>,
        hub: RoomHub,
    ) -> Self {
        tracing::info!("[Board] Using '{}' access policy", policy.name());
        Self {
            store,
            locks,
            policy,
            hub,
        }
    }

    pub fn store(&self) -> &Arc<dyn BoardStore> {
        &self.store
    }

    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    /// Load a board the user is allowed to see
    pub(super) async fn accessible_board(
        &self,
        user_id: Uuid,
        board_id: Uuid,
    ) -> Result<Board, BoardError> {
        let board = self
            .store
            .board(board_id)
            .await?
            .ok_or(BoardError::not_found(EntityType::Board, board_id))?;
        if !self.policy.can_access(user_id, &board) {
            tracing::info!("[Board] {} denied access to board {}", user_id, board_id);
            return Err(BoardError::not_found(EntityType::Board, board_id));
        }
        Ok(board)
    }

    /// Load a live column and its board, hiding both if access is denied
    pub(super) async fn accessible_column(
        &self,
        user_id: Uuid,
        column_id: Uuid,
    ) -> Result<(Column, Board), BoardError> {
        let column = self
            .store
            .column(column_id)
            .await?
            .ok_or(BoardError::not_found(EntityType::Column, column_id))?;
        let board = self
            .accessible_board(user_id, column.board_id)
            .await
            .map_err(|err| match err {
                BoardError::NotFound { .. } => BoardError::not_found(EntityType::Column, column_id),
                other => other,
            })?;
        Ok((column, board))
    }

    /// Load a live card with its column and board
    pub(super) async fn accessible_card(
        &self,
        user_id: Uuid,
        card_id: Uuid,
    ) -> Result<(Card, Column, Board), BoardError> {
        let card = self
            .store
            .card(card_id)
            .await?
            .ok_or(BoardError::not_found(EntityType::Card, card_id))?;
        let (column, board) = self
            .accessible_column(user_id, card.column_id)
            .await
            .map_err(|err| match err {
                BoardError::NotFound { .. } => BoardError::not_found(EntityType::Card, card_id),
                other => other,
            })?;
        Ok((card, column, board))
    }

    /// Whether `user_id` may join the room of `board_id`
    pub async fn authorize_view(&self, user_id: Uuid, board_id: Uuid) -> Result<Board, BoardError> {
        self.accessible_board(user_id, board_id).await
    }

    pub(super) async fn broadcast(&self, board_id: Uuid, user_id: Uuid, change: BoardChange) {
        let name = change.name();
        let delivered = self
            .hub
            .emit_change(ChangeEvent::new(board_id, user_id, change))
            .await;
        tracing::debug!(
            "[Realtime] {} on board {} delivered to {} connection(s)",
            name,
            board_id,
            delivered
        );
    }

    pub(super) async fn audit(&self, entry: AuditEntry) {
        audit::record(self.store.as_ref(), entry).await;
    }
}
