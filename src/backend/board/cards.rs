//! Card operations
//!
//! Edits and deletes run under the card's lease, the same one a move takes,
//! so field edits and moves of one card are totally ordered. Creation needs no
//! lease: the card does not exist yet and the column lock orders appends.

use super::error::BoardError;
use super::service::BoardService;
use crate::shared::event::BoardChange;
use crate::shared::ledger;
use crate::shared::model::{
    AuditAction, AuditEntry, Card, CardPatch, EntityType, NewCard, Placement,
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

impl BoardService {
    /// Append a card at the end of its column
    pub async fn create_card(&self, user_id: Uuid, request: NewCard) -> Result<Card, BoardError> {
        let column_id = request.validate()?;
        let (_, board) = self.accessible_column(user_id, column_id).await?;

        let mut tx = self.store.begin().await?;
        tx.lock_column(column_id)
            .await?
            .ok_or(BoardError::not_found(EntityType::Column, column_id))?;
        let count = tx.count_cards(column_id).await?;
        let now = Utc::now();
        let card = Card {
            id: Uuid::new_v4(),
            column_id,
            title: request.title.trim().to_string(),
            description: request.description,
            position: ledger::append_position(count),
            assignee_id: request.assignee_id,
            due_date: request.due_date,
            labels: request.labels.unwrap_or_default(),
            priority: request.priority.unwrap_or_default(),
            version: 1,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        tx.insert_card(&card).await?;
        tx.commit().await?;

        tracing::info!(
            "[Board] {} created card {} at {} in column {}",
            user_id,
            card.id,
            card.position,
            column_id
        );
        self.audit(
            AuditEntry::new(
                AuditAction::CardCreated,
                EntityType::Card,
                card.id,
                board.id,
                user_id,
            )
            .with_metadata(json!({
                "title": card.title,
                "columnId": column_id,
                "assigneeId": card.assignee_id,
            })),
        )
        .await;
        self.broadcast(board.id, user_id, BoardChange::CardCreated { card: card.clone() })
            .await;
        Ok(card)
    }

    /// Apply a partial edit to a card
    pub async fn update_card(
        &self,
        user_id: Uuid,
        card_id: Uuid,
        patch: CardPatch,
    ) -> Result<Card, BoardError> {
        patch.validate()?;
        let (_, _, board) = self.accessible_card(user_id, card_id).await?;

        let patch_ref = &patch;
        let (card, before, reassigned) = self
            .locks
            .with_lease(card_id, user_id, move || {
                self.write_card_patch(card_id, patch_ref)
            })
            .await?;

        let action = if reassigned {
            AuditAction::CardAssigned
        } else {
            AuditAction::CardUpdated
        };
        self.audit(
            AuditEntry::new(action, EntityType::Card, card_id, board.id, user_id).with_changes(
                json!({
                    "before": before,
                    "after": CardPatch::snapshot_of(&card),
                }),
            ),
        )
        .await;
        self.broadcast(
            board.id,
            user_id,
            BoardChange::CardUpdated {
                card: card.clone(),
                changes: patch,
            },
        )
        .await;
        Ok(card)
    }

    async fn write_card_patch(
        &self,
        card_id: Uuid,
        patch: &CardPatch,
    ) -> Result<(Card, serde_json::Value, bool), BoardError> {
        let mut tx = self.store.begin().await?;
        let mut card = tx
            .lock_card(card_id)
            .await?
            .ok_or(BoardError::not_found(EntityType::Card, card_id))?;
        let before = CardPatch::snapshot_of(&card);
        let reassigned = patch.reassigns(&card);
        patch.apply_to(&mut card);
        card.version += 1;
        card.updated_at = Utc::now();
        tx.update_card_fields(&card).await?;
        tx.commit().await?;
        Ok((card, before, reassigned))
    }

    /// Soft-delete a card and close the gap it leaves in its column
    pub async fn delete_card(&self, user_id: Uuid, card_id: Uuid) -> Result<(), BoardError> {
        let (_, _, board) = self.accessible_card(user_id, card_id).await?;

        let (card, placements) = self
            .locks
            .with_lease(card_id, user_id, move || self.write_card_delete(card_id))
            .await?;

        tracing::info!("[Board] {} deleted card {}", user_id, card_id);
        self.audit(
            AuditEntry::new(
                AuditAction::CardDeleted,
                EntityType::Card,
                card_id,
                board.id,
                user_id,
            )
            .with_metadata(json!({ "title": card.title, "columnId": card.column_id })),
        )
        .await;
        self.broadcast(
            board.id,
            user_id,
            BoardChange::CardDeleted {
                card_id,
                column_id: card.column_id,
                placements,
            },
        )
        .await;
        Ok(())
    }

    async fn write_card_delete(&self, card_id: Uuid) -> Result<(Card, Vec<Placement>), BoardError> {
        let mut tx = self.store.begin().await?;
        let column_id = tx
            .card(card_id)
            .await?
            .ok_or(BoardError::not_found(EntityType::Card, card_id))?
            .column_id;
        tx.lock_column(column_id)
            .await?
            .ok_or(BoardError::not_found(EntityType::Column, column_id))?;
        let mut card = tx
            .lock_card(card_id)
            .await?
            .ok_or(BoardError::not_found(EntityType::Card, card_id))?;
        if card.column_id != column_id {
            return Err(BoardError::Contended { id: card_id });
        }
        let order: Vec<Uuid> = tx
            .column_cards(card.column_id)
            .await?
            .iter()
            .map(|c| c.id)
            .collect();
        let remaining = ledger::close_gap(&order, card_id)
            .ok_or(BoardError::not_found(EntityType::Card, card_id))?;

        let now = Utc::now();
        card.deleted_at = Some(now);
        card.updated_at = now;
        tx.update_card(&card).await?;
        let placements = ledger::placements_for(card.column_id, &remaining);
        tx.apply_placements(&placements, now).await?;
        tx.commit().await?;
        Ok((card, placements))
    }
}
