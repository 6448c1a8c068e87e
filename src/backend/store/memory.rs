//! In-memory board store
//!
//! A transaction takes the store-wide mutex for its whole lifetime and works
//! on a private copy of the state. `commit` swaps the copy in; dropping the
//! transaction discards it. Row locks are therefore implicit: only one
//! transaction exists at a time.

use super::{BoardStore, StoreError, StoreTx};
use crate::shared::model::{
    AuditEntry, Board, BoardSnapshot, Card, Column, ColumnWithCards, Placement,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
struct State {
    boards: HashMap<Uuid, Board>,
    columns: HashMap<Uuid, Column>,
    cards: HashMap<Uuid, Card>,
    audit: Vec<AuditEntry>,
}

impl State {
    fn live_column(&self, column_id: Uuid) -> Option<&Column> {
        self.columns
            .get(&column_id)
            .filter(|column| column.deleted_at.is_none())
    }

    fn live_card(&self, card_id: Uuid) -> Option<&Card> {
        self.cards.get(&card_id).filter(|card| !card.is_deleted())
    }

    fn board_columns(&self, board_id: Uuid) -> Vec<Column> {
        let mut columns: Vec<Column> = self
            .columns
            .values()
            .filter(|c| c.board_id == board_id && c.deleted_at.is_none())
            .cloned()
            .collect();
        columns.sort_by_key(|c| (c.position, c.created_at));
        columns
    }

    fn column_cards(&self, column_id: Uuid) -> Vec<Card> {
        let mut cards: Vec<Card> = self
            .cards
            .values()
            .filter(|c| c.column_id == column_id && !c.is_deleted())
            .cloned()
            .collect();
        cards.sort_by_key(|c| (c.position, c.created_at));
        cards
    }
}

#[derive(Debug, Default)]
struct Faults {
    failing_commits: AtomicUsize,
    failing_audit: AtomicBool,
    failing_reads: AtomicBool,
}

/// In-process [`BoardStore`]
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    faults: Arc<Faults>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` commits fail with [`StoreError::Injected`]
    pub fn fail_next_commits(&self, count: usize) {
        self.faults.failing_commits.store(count, Ordering::SeqCst);
    }

    /// Make every audit append fail until switched off again
    pub fn fail_audit(&self, failing: bool) {
        self.faults.failing_audit.store(failing, Ordering::SeqCst);
    }

    /// Make every board lookup fail until switched off again
    pub fn fail_board_reads(&self, failing: bool) {
        self.faults.failing_reads.store(failing, Ordering::SeqCst);
    }

    /// Positions of the non-deleted cards of a column, in order
    pub async fn positions(&self, column_id: Uuid) -> Vec<(Uuid, i32)> {
        self.state
            .lock()
            .await
            .column_cards(column_id)
            .into_iter()
            .map(|card| (card.id, card.position))
            .collect()
    }
}

#[async_trait]
impl BoardStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx {
            guard,
            working,
            faults: self.faults.clone(),
        }))
    }

    async fn board(&self, board_id: Uuid) -> Result<Option<Board>, StoreError> {
        if self.faults.failing_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Injected("board read failure".to_string()));
        }
        Ok(self.state.lock().await.boards.get(&board_id).cloned())
    }

    async fn boards_for_owner(&self, owner_id: Uuid) -> Result<Vec<Board>, StoreError> {
        let state = self.state.lock().await;
        let mut boards: Vec<Board> = state
            .boards
            .values()
            .filter(|b| b.owner_id == owner_id)
            .cloned()
            .collect();
        boards.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(boards)
    }

    async fn column(&self, column_id: Uuid) -> Result<Option<Column>, StoreError> {
        Ok(self.state.lock().await.live_column(column_id).cloned())
    }

    async fn card(&self, card_id: Uuid) -> Result<Option<Card>, StoreError> {
        Ok(self.state.lock().await.live_card(card_id).cloned())
    }

    async fn snapshot(&self, board_id: Uuid) -> Result<Option<BoardSnapshot>, StoreError> {
        let state = self.state.lock().await;
        let Some(board) = state.boards.get(&board_id).cloned() else {
            return Ok(None);
        };
        let columns = state
            .board_columns(board_id)
            .into_iter()
            .map(|column| {
                let cards = state.column_cards(column.id);
                ColumnWithCards { column, cards }
            })
            .collect();
        Ok(Some(BoardSnapshot { board, columns }))
    }

    async fn append_audit(&self, entry: &AuditEntry) -> Result<(), StoreError> {
        if self.faults.failing_audit.load(Ordering::SeqCst) {
            return Err(StoreError::Injected("audit append".to_string()));
        }
        self.state.lock().await.audit.push(entry.clone());
        Ok(())
    }

    async fn audit_trail(&self, board_id: Uuid, limit: i64) -> Result<Vec<AuditEntry>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .audit
            .iter()
            .rev()
            .filter(|entry| entry.board_id == board_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<State>,
    working: State,
    faults: Arc<Faults>,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn lock_board(&mut self, board_id: Uuid) -> Result<Option<Board>, StoreError> {
        Ok(self.working.boards.get(&board_id).cloned())
    }

    async fn lock_column(&mut self, column_id: Uuid) -> Result<Option<Column>, StoreError> {
        Ok(self.working.live_column(column_id).cloned())
    }

    async fn card(&mut self, card_id: Uuid) -> Result<Option<Card>, StoreError> {
        Ok(self.working.live_card(card_id).cloned())
    }

    async fn lock_card(&mut self, card_id: Uuid) -> Result<Option<Card>, StoreError> {
        Ok(self.working.live_card(card_id).cloned())
    }

    async fn board_columns(&mut self, board_id: Uuid) -> Result<Vec<Column>, StoreError> {
        Ok(self.working.board_columns(board_id))
    }

    async fn column_cards(&mut self, column_id: Uuid) -> Result<Vec<Card>, StoreError> {
        Ok(self.working.column_cards(column_id))
    }

    async fn count_cards(&mut self, column_id: Uuid) -> Result<i64, StoreError> {
        Ok(self
            .working
            .cards
            .values()
            .filter(|c| c.column_id == column_id && !c.is_deleted())
            .count() as i64)
    }

    async fn insert_board(&mut self, board: &Board) -> Result<(), StoreError> {
        self.working.boards.insert(board.id, board.clone());
        Ok(())
    }

    async fn update_board(&mut self, board: &Board) -> Result<(), StoreError> {
        match self.working.boards.get_mut(&board.id) {
            Some(existing) => {
                *existing = board.clone();
                Ok(())
            }
            None => Err(StoreError::Corrupt(format!("board {} vanished", board.id))),
        }
    }

    async fn insert_column(&mut self, column: &Column) -> Result<(), StoreError> {
        self.working.columns.insert(column.id, column.clone());
        Ok(())
    }

    async fn update_column(&mut self, column: &Column) -> Result<(), StoreError> {
        match self.working.columns.get_mut(&column.id) {
            Some(existing) => {
                existing.title = column.title.clone();
                existing.position = column.position;
                existing.deleted_at = column.deleted_at;
                existing.updated_at = column.updated_at;
                Ok(())
            }
            None => Err(StoreError::Corrupt(format!("column {} vanished", column.id))),
        }
    }

    async fn insert_card(&mut self, card: &Card) -> Result<(), StoreError> {
        self.working.cards.insert(card.id, card.clone());
        Ok(())
    }

    async fn update_card(&mut self, card: &Card) -> Result<(), StoreError> {
        match self.working.cards.get_mut(&card.id) {
            Some(existing) => {
                *existing = card.clone();
                Ok(())
            }
            None => Err(StoreError::Corrupt(format!("card {} vanished", card.id))),
        }
    }

    async fn update_card_fields(&mut self, card: &Card) -> Result<(), StoreError> {
        match self.working.cards.get_mut(&card.id) {
            Some(existing) if !existing.is_deleted() => {
                existing.title = card.title.clone();
                existing.description = card.description.clone();
                existing.assignee_id = card.assignee_id;
                existing.due_date = card.due_date;
                existing.labels = card.labels.clone();
                existing.priority = card.priority;
                existing.version = card.version;
                existing.updated_at = card.updated_at;
                Ok(())
            }
            _ => Err(StoreError::Corrupt(format!("card {} vanished", card.id))),
        }
    }

    async fn delete_column_cards(
        &mut self,
        column_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut deleted = 0;
        for card in self.working.cards.values_mut() {
            if card.column_id == column_id && !card.is_deleted() {
                card.deleted_at = Some(at);
                card.updated_at = at;
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn apply_placements(
        &mut self,
        placements: &[Placement],
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        for placement in placements {
            let card = self
                .working
                .cards
                .get_mut(&placement.card_id)
                .ok_or_else(|| StoreError::Corrupt(format!("card {} vanished", placement.card_id)))?;
            if card.column_id != placement.column_id || card.position != placement.position {
                card.column_id = placement.column_id;
                card.position = placement.position;
                card.updated_at = at;
            }
        }
        Ok(())
    }

    async fn apply_column_order(
        &mut self,
        column_ids: &[Uuid],
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        for (index, column_id) in column_ids.iter().enumerate() {
            let column = self
                .working
                .columns
                .get_mut(column_id)
                .ok_or_else(|| StoreError::Corrupt(format!("column {} vanished", column_id)))?;
            if column.position != index as i32 {
                column.position = index as i32;
                column.updated_at = at;
            }
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let this = *self;
        let pending = this.faults.failing_commits.load(Ordering::SeqCst);
        if pending > 0 {
            this.faults
                .failing_commits
                .store(pending - 1, Ordering::SeqCst);
            tracing::warn!("[Store] Injected commit failure, rolling back");
            return Err(StoreError::Injected("commit".to_string()));
        }
        let MemoryTx {
            mut guard, working, ..
        } = this;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
