//! # Optimistic Board View
//!
//! Client-side view model for one board. It keeps two copies of the board:
//!
//! - the **authoritative** state, built only from snapshots and broadcast
//!   change events
//! - the **rendered** state, the authoritative state with the user's pending
//!   moves replayed on top
//!
//! A move is applied to the rendered state immediately using the same ledger
//! the server uses. When the server's `card_moved` event for that card
//! arrives, the guess is discarded and the card is placed exactly where the
//! event says, even if that means a visible jump. A failed move is rolled
//! back and the view is marked stale until a fresh snapshot replaces it.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use boardsync::client::board_view::BoardView;
//! # fn example(snapshot: boardsync::shared::BoardSnapshot, intent: boardsync::shared::MoveIntent) {
//! let mut view = BoardView::new(snapshot);
//! view.apply_optimistic_move(intent).ok();
//! // ... later, for every event received on the stream:
//! // view.apply_event(&event);
//! # }
//! ```

use crate::shared::event::{BoardChange, ChangeEvent};
use crate::shared::ledger::{self, LedgerError, MoveOutcome};
use crate::shared::model::{BoardSnapshot, Card, ColumnWithCards, MoveIntent, Placement};
use std::collections::HashSet;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewError {
    #[error("card {0} is not on this board")]
    UnknownCard(Uuid),

    #[error("column {0} is not on this board")]
    UnknownColumn(Uuid),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// A move applied locally and not yet settled by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingMove {
    pub intent: MoveIntent,
}

#[derive(Debug, Clone)]
pub struct BoardView {
    authoritative: BoardSnapshot,
    rendered: BoardSnapshot,
    pending: Vec<PendingMove>,
    stale: bool,
}

impl BoardView {
    pub fn new(snapshot: BoardSnapshot) -> Self {
        Self {
            rendered: snapshot.clone(),
            authoritative: snapshot,
            pending: Vec::new(),
            stale: false,
        }
    }

    pub fn board_id(&self) -> Uuid {
        self.authoritative.board.id
    }

    /// What the user should see
    pub fn snapshot(&self) -> &BoardSnapshot {
        &self.rendered
    }

    /// Last state confirmed by the server
    pub fn authoritative(&self) -> &BoardSnapshot {
        &self.authoritative
    }

    pub fn pending(&self) -> &[PendingMove] {
        &self.pending
    }

    pub fn has_pending(&self, card_id: Uuid) -> bool {
        self.pending.iter().any(|p| p.intent.card_id == card_id)
    }

    /// True after a rollback until [`Self::replace`] installs a fresh snapshot
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Card ids of a column in rendered order
    pub fn card_order(&self, column_id: Uuid) -> Option<Vec<Uuid>> {
        self.rendered
            .column(column_id)
            .map(|column| column.cards.iter().map(|c| c.id).collect())
    }

    /// Apply a move locally before the server confirms it
    pub fn apply_optimistic_move(&mut self, intent: MoveIntent) -> Result<MoveOutcome, ViewError> {
        let outcome = plan_move(&self.rendered, intent)?;
        if outcome.changed {
            apply_placements(&mut self.rendered, &outcome.placements());
        }
        self.pending.retain(|p| p.intent.card_id != intent.card_id);
        self.pending.push(PendingMove { intent });
        Ok(outcome)
    }

    /// The server accepted the move for `card_id`
    ///
    /// A move that changed nothing produces no broadcast, so its guess is
    /// dropped here. A real move stays pending until its `card_moved` event.
    pub fn confirm_move(&mut self, card_id: Uuid, changed: bool) {
        if !changed {
            self.pending.retain(|p| p.intent.card_id != card_id);
        }
    }

    /// The server rejected the move for `card_id`
    ///
    /// The guess is removed and the view is re-rendered from the last
    /// authoritative state. The view stays stale until the caller refetches
    /// the board and calls [`Self::replace`].
    pub fn rollback_move(&mut self, card_id: Uuid) {
        self.pending.retain(|p| p.intent.card_id != card_id);
        self.stale = true;
        self.rerender();
    }

    /// Install a freshly fetched snapshot, discarding every guess
    pub fn replace(&mut self, snapshot: BoardSnapshot) {
        self.authoritative = snapshot.clone();
        self.rendered = snapshot;
        self.pending.clear();
        self.stale = false;
    }

    /// Apply a broadcast change. Returns false for events of other boards.
    pub fn apply_event(&mut self, event: &ChangeEvent) -> bool {
        if event.board_id != self.board_id() {
            return false;
        }
        if let BoardChange::CardMoved { card, .. } = &event.change {
            self.pending.retain(|p| p.intent.card_id != card.id);
        }
        if let BoardChange::CardDeleted { card_id, .. } = &event.change {
            self.pending.retain(|p| p.intent.card_id != *card_id);
        }
        apply_change(&mut self.authoritative, &event.change);
        self.rerender();
        true
    }

    fn rerender(&mut self) {
        let mut rendered = self.authoritative.clone();
        let mut kept = Vec::with_capacity(self.pending.len());
        for pending in &self.pending {
            match plan_move(&rendered, pending.intent) {
                Ok(outcome) => {
                    if outcome.changed {
                        apply_placements(&mut rendered, &outcome.placements());
                    }
                    kept.push(*pending);
                }
                Err(e) => {
                    tracing::debug!(
                        "Dropping pending move of {}: {}",
                        pending.intent.card_id,
                        e
                    );
                }
            }
        }
        self.pending = kept;
        self.rendered = rendered;
    }
}

fn order_of(column: &ColumnWithCards) -> Vec<Uuid> {
    column.cards.iter().map(|c| c.id).collect()
}

fn plan_move(snapshot: &BoardSnapshot, intent: MoveIntent) -> Result<MoveOutcome, ViewError> {
    let card = snapshot
        .card(intent.card_id)
        .ok_or(ViewError::UnknownCard(intent.card_id))?;
    let source_column_id = card.column_id;
    let source = snapshot
        .column(source_column_id)
        .map(order_of)
        .ok_or(ViewError::UnknownColumn(source_column_id))?;
    let target = if intent.target_column_id == source_column_id {
        None
    } else {
        Some(
            snapshot
                .column(intent.target_column_id)
                .map(order_of)
                .ok_or(ViewError::UnknownColumn(intent.target_column_id))?,
        )
    };
    Ok(ledger::reindex_after_move(
        intent.card_id,
        source_column_id,
        &source,
        intent.target_column_id,
        target.as_deref(),
        intent.target_index,
    )?)
}

fn take_card(snapshot: &mut BoardSnapshot, card_id: Uuid) -> Option<Card> {
    for column in &mut snapshot.columns {
        if let Some(index) = column.cards.iter().position(|c| c.id == card_id) {
            return Some(column.cards.remove(index));
        }
    }
    None
}

fn put_card(snapshot: &mut BoardSnapshot, card: Card) {
    if let Some(column) = snapshot
        .columns
        .iter_mut()
        .find(|c| c.column.id == card.column_id)
    {
        column.cards.push(card);
    }
}

fn sort_columns(snapshot: &mut BoardSnapshot, touched: &HashSet<Uuid>) {
    for column in &mut snapshot.columns {
        if touched.contains(&column.column.id) {
            column.cards.sort_by_key(|c| c.position);
        }
    }
}

/// Move every placed card to its column and position
fn apply_placements(snapshot: &mut BoardSnapshot, placements: &[Placement]) {
    let mut touched = HashSet::new();
    for placement in placements {
        let Some(mut card) = take_card(snapshot, placement.card_id) else {
            continue;
        };
        touched.insert(card.column_id);
        touched.insert(placement.column_id);
        card.column_id = placement.column_id;
        card.position = placement.position;
        put_card(snapshot, card);
    }
    sort_columns(snapshot, &touched);
}

fn upsert_card(snapshot: &mut BoardSnapshot, card: &Card) {
    take_card(snapshot, card.id);
    put_card(snapshot, card.clone());
    sort_columns(snapshot, &HashSet::from([card.column_id]));
}

fn apply_change(snapshot: &mut BoardSnapshot, change: &BoardChange) {
    match change {
        BoardChange::CardCreated { card } | BoardChange::CardUpdated { card, .. } => {
            upsert_card(snapshot, card);
        }
        BoardChange::CardMoved {
            card, placements, ..
        } => {
            upsert_card(snapshot, card);
            apply_placements(snapshot, placements);
        }
        BoardChange::CardDeleted {
            card_id,
            placements,
            ..
        } => {
            take_card(snapshot, *card_id);
            apply_placements(snapshot, placements);
        }
        BoardChange::ColumnCreated { column } => {
            if snapshot.column(column.id).is_none() {
                snapshot.columns.push(ColumnWithCards {
                    column: column.clone(),
                    cards: Vec::new(),
                });
                snapshot.columns.sort_by_key(|c| c.column.position);
            }
        }
        BoardChange::ColumnUpdated { column } => {
            if let Some(existing) = snapshot
                .columns
                .iter_mut()
                .find(|c| c.column.id == column.id)
            {
                existing.column = column.clone();
            }
        }
        BoardChange::ColumnDeleted {
            column_id,
            column_ids,
        } => {
            snapshot.columns.retain(|c| c.column.id != *column_id);
            reorder(snapshot, column_ids);
        }
        BoardChange::ColumnsReordered { column_ids } => reorder(snapshot, column_ids),
        BoardChange::BoardUpdated { board } => snapshot.board = board.clone(),
    }
}

fn reorder(snapshot: &mut BoardSnapshot, column_ids: &[Uuid]) {
    for column in &mut snapshot.columns {
        if let Some(index) = column_ids.iter().position(|id| *id == column.column.id) {
            column.column.position = index as i32;
        }
    }
    snapshot.columns.sort_by_key(|c| c.column.position);
}
