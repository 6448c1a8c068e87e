//! Move Coordinator
//!
//! Drives one card move through its stages:
//!
//! ```text
//! Requested -> LockAcquired -> Reindexed -> Persisted -> Broadcast -> Done
//!     \             \              \             \
//!      +-------------+--------------+-------------+--> Failed
//! ```
//!
//! The card's lease is held from `LockAcquired` until after the broadcast and
//! is released whatever happens. Inside the lease a single store transaction
//! locks the affected column rows (ascending id order) and then the card row,
//! reads the current card order, lets the ledger derive the complete new order
//! and writes it back. An error before commit drops the transaction, so a failed move never
//! leaves a column partially renumbered.
//!
//! Moves of different cards in one column hold different leases; they are
//! ordered by the column row lock instead, and each one re-derives the whole
//! sequence from what the previous one committed.

use super::error::BoardError;
use super::service::BoardService;
use crate::shared::event::BoardChange;
use crate::shared::ledger::{self, MoveOutcome};
use crate::shared::model::{
    AuditAction, AuditEntry, Card, EntityType, MoveCardRequest, MoveIntent, Placement,
};
use chrono::Utc;
use serde_json::json;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveStage {
    Requested,
    LockAcquired,
    Reindexed,
    Persisted,
    Broadcast,
    Done,
    Failed,
}

impl fmt::Display for MoveStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MoveStage::Requested => "requested",
            MoveStage::LockAcquired => "lock_acquired",
            MoveStage::Reindexed => "reindexed",
            MoveStage::Persisted => "persisted",
            MoveStage::Broadcast => "broadcast",
            MoveStage::Done => "done",
            MoveStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Stage trail of one move
#[derive(Debug)]
struct MoveRun {
    id: Uuid,
    user_id: Uuid,
    stages: Vec<MoveStage>,
}

impl MoveRun {
    fn start(user_id: Uuid) -> Self {
        let id = Uuid::new_v4();
        tracing::debug!("[Move] {} requested by {}", id, user_id);
        Self {
            id,
            user_id,
            stages: vec![MoveStage::Requested],
        }
    }

    fn advance(&mut self, stage: MoveStage) {
        tracing::debug!("[Move] {} -> {}", self.id, stage);
        self.stages.push(stage);
    }

    fn fail(&mut self, err: &BoardError) {
        let last = self.stages.last().copied().unwrap_or(MoveStage::Requested);
        match err {
            BoardError::Contended { .. } | BoardError::NotFound { .. } | BoardError::Validation(_) => {
                tracing::info!("[Move] {} failed after {}: {}", self.id, last, err)
            }
            BoardError::Persistence(e) => {
                tracing::error!("[Move] {} failed after {}: {:?}", self.id, last, e)
            }
        }
        self.stages.push(MoveStage::Failed);
    }
}

/// Result of a completed move
#[derive(Debug, Clone)]
pub struct MoveReport {
    pub card: Card,
    pub source_column_id: Uuid,
    pub target_column_id: Uuid,
    pub new_position: i32,
    /// Full order of every affected column after the move
    pub placements: Vec<Placement>,
    /// False for a move onto the card's current index; nothing was written
    pub changed: bool,
    pub stages: Vec<MoveStage>,
}

impl BoardService {
    /// Move a card to `target_index` of `target_column_id`
    pub async fn move_card(
        &self,
        user_id: Uuid,
        request: MoveCardRequest,
    ) -> Result<MoveReport, BoardError> {
        let mut run = MoveRun::start(user_id);
        match self.run_move(&mut run, &request).await {
            Ok((card, outcome)) => {
                run.advance(MoveStage::Done);
                Ok(MoveReport {
                    placements: outcome.placements(),
                    source_column_id: outcome.source_column_id,
                    target_column_id: outcome.target_column_id,
                    new_position: outcome.new_position,
                    changed: outcome.changed,
                    card,
                    stages: run.stages,
                })
            }
            Err(err) => {
                run.fail(&err);
                Err(err)
            }
        }
    }

    async fn run_move(
        &self,
        run: &mut MoveRun,
        request: &MoveCardRequest,
    ) -> Result<(Card, MoveOutcome), BoardError> {
        let intent = request.validate()?;
        let (card, source_column, board) = self.accessible_card(run.user_id, intent.card_id).await?;

        if intent.target_column_id != source_column.id {
            let target = self
                .store
                .column(intent.target_column_id)
                .await?
                .ok_or(BoardError::not_found(
                    EntityType::Column,
                    intent.target_column_id,
                ))?;
            if target.board_id != board.id {
                return Err(BoardError::validation(
                    "targetColumnId",
                    "Target column belongs to a different board",
                ));
            }
        }

        let board_id = board.id;
        let user_id = run.user_id;
        self.locks
            .with_lease(card.id, user_id, move || {
                self.move_under_lease(run, board_id, intent)
            })
            .await
    }

    async fn move_under_lease(
        &self,
        run: &mut MoveRun,
        board_id: Uuid,
        intent: MoveIntent,
    ) -> Result<(Card, MoveOutcome), BoardError> {
        run.advance(MoveStage::LockAcquired);

        let mut tx = self.store.begin().await?;
        let current = tx
            .card(intent.card_id)
            .await?
            .ok_or(BoardError::not_found(EntityType::Card, intent.card_id))?;
        let source_column_id = current.column_id;
        let cross_column = intent.target_column_id != source_column_id;

        let mut to_lock = vec![source_column_id, intent.target_column_id];
        to_lock.sort();
        to_lock.dedup();
        for column_id in to_lock {
            tx.lock_column(column_id)
                .await?
                .ok_or(BoardError::not_found(EntityType::Column, column_id))?;
        }
        let current = tx
            .lock_card(intent.card_id)
            .await?
            .ok_or(BoardError::not_found(EntityType::Card, intent.card_id))?;
        if current.column_id != source_column_id {
            return Err(BoardError::Contended { id: intent.card_id });
        }

        let source: Vec<Uuid> = tx
            .column_cards(source_column_id)
            .await?
            .iter()
            .map(|c| c.id)
            .collect();
        let target: Option<Vec<Uuid>> = if cross_column {
            Some(
                tx.column_cards(intent.target_column_id)
                    .await?
                    .iter()
                    .map(|c| c.id)
                    .collect(),
            )
        } else {
            None
        };

        let outcome = ledger::reindex_after_move(
            intent.card_id,
            source_column_id,
            &source,
            intent.target_column_id,
            target.as_deref(),
            intent.target_index,
        )?;
        run.advance(MoveStage::Reindexed);

        if !outcome.changed {
            tx.rollback().await?;
            tracing::debug!("[Move] {} left card {} in place", run.id, intent.card_id);
            return Ok((current, outcome));
        }

        let now = Utc::now();
        let placements = outcome.placements();
        let mut moved = current.clone();
        moved.column_id = outcome.target_column_id;
        moved.position = outcome.new_position;
        moved.version += 1;
        moved.updated_at = now;
        tx.apply_placements(&placements, now).await?;
        tx.update_card(&moved).await?;
        tx.commit().await?;
        run.advance(MoveStage::Persisted);

        tracing::info!(
            "[Move] {} moved card {} from {}@{} to {}@{}",
            run.user_id,
            moved.id,
            current.column_id,
            current.position,
            moved.column_id,
            moved.position
        );

        self.broadcast(
            board_id,
            run.user_id,
            BoardChange::CardMoved {
                card: moved.clone(),
                source_column_id,
                target_column_id: outcome.target_column_id,
                new_position: outcome.new_position,
                placements,
            },
        )
        .await;
        run.advance(MoveStage::Broadcast);

        self.audit(
            AuditEntry::new(
                AuditAction::CardMoved,
                EntityType::Card,
                moved.id,
                board_id,
                run.user_id,
            )
            .with_changes(json!({
                "from": { "columnId": current.column_id, "position": current.position },
                "to": { "columnId": moved.column_id, "position": moved.position },
            })),
        )
        .await;

        Ok((moved, outcome))
    }
}
