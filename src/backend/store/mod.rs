//! Board Persistence
//!
//! The board service talks to persistence only through [`BoardStore`] and the
//! transaction handle it hands out, [`StoreTx`]. Every mutation that touches
//! more than one row (a move spanning two columns, a column delete) runs inside
//! a single `StoreTx` and either commits as a whole or not at all. Dropping a
//! transaction without committing rolls it back.
//!
//! # Locking
//!
//! `lock_board` and `lock_column` take a row lock that is held until the
//! transaction ends. Any operation that re-derives the order of a column's
//! cards locks that column first; any operation that re-derives the column
//! order of a board locks the board first. Callers that lock two columns do so
//! in ascending id order.
//!
//! # Implementations
//!
//! - [`memory::MemoryStore`] - in-process store, one transaction at a time,
//!   with fault injection for tests
//! - [`postgres::PgStore`] - sqlx/Postgres with `SELECT ... FOR UPDATE`

use crate::shared::model::{AuditEntry, Board, BoardSnapshot, Card, Column, Placement};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// In-memory store
pub mod memory;

/// Postgres store
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Persistence failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored value could not be mapped back into the model
    #[error("corrupt row: {0}")]
    Corrupt(String),

    /// Failure produced on purpose by a test store
    #[error("injected failure: {0}")]
    Injected(String),
}

/// A board store
#[async_trait]
pub trait BoardStore: Send + Sync {
    /// Open a transaction
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError>;

    async fn board(&self, board_id: Uuid) -> Result<Option<Board>, StoreError>;

    async fn boards_for_owner(&self, owner_id: Uuid) -> Result<Vec<Board>, StoreError>;

    /// Non-deleted column by id
    async fn column(&self, column_id: Uuid) -> Result<Option<Column>, StoreError>;

    /// Non-deleted card by id
    async fn card(&self, card_id: Uuid) -> Result<Option<Card>, StoreError>;

    /// The board with its ordered non-deleted columns and cards
    async fn snapshot(&self, board_id: Uuid) -> Result<Option<BoardSnapshot>, StoreError>;

    /// Append an audit entry outside of any transaction
    async fn append_audit(&self, entry: &AuditEntry) -> Result<(), StoreError>;

    /// Most recent audit entries of a board, newest first
    async fn audit_trail(&self, board_id: Uuid, limit: i64) -> Result<Vec<AuditEntry>, StoreError>;
}

/// An open store transaction
#[async_trait]
pub trait StoreTx: Send {
    /// Lock and return a board
    async fn lock_board(&mut self, board_id: Uuid) -> Result<Option<Board>, StoreError>;

    /// Lock and return a non-deleted column
    async fn lock_column(&mut self, column_id: Uuid) -> Result<Option<Column>, StoreError>;

    /// Non-deleted card by id, as seen by this transaction
    async fn card(&mut self, card_id: Uuid) -> Result<Option<Card>, StoreError>;

    /// Lock and return a non-deleted card
    async fn lock_card(&mut self, card_id: Uuid) -> Result<Option<Card>, StoreError>;

    /// Non-deleted columns of a board in position order
    async fn board_columns(&mut self, board_id: Uuid) -> Result<Vec<Column>, StoreError>;

    /// Non-deleted cards of a column in position order
    async fn column_cards(&mut self, column_id: Uuid) -> Result<Vec<Card>, StoreError>;

    /// Number of non-deleted cards in a column
    async fn count_cards(&mut self, column_id: Uuid) -> Result<i64, StoreError>;

    async fn insert_board(&mut self, board: &Board) -> Result<(), StoreError>;

    async fn update_board(&mut self, board: &Board) -> Result<(), StoreError>;

    async fn insert_column(&mut self, column: &Column) -> Result<(), StoreError>;

    /// Write title, position, deleted_at and updated_at of a column
    async fn update_column(&mut self, column: &Column) -> Result<(), StoreError>;

    async fn insert_card(&mut self, card: &Card) -> Result<(), StoreError>;

    /// Write every mutable field of a card
    async fn update_card(&mut self, card: &Card) -> Result<(), StoreError>;

    /// Write the editable fields, version and updated_at of a non-deleted card.
    /// Column, position and deleted_at are left as stored.
    async fn update_card_fields(&mut self, card: &Card) -> Result<(), StoreError>;

    /// Soft-delete every non-deleted card of a column
    async fn delete_column_cards(
        &mut self,
        column_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    /// Write column and position of each placed card
    async fn apply_placements(
        &mut self,
        placements: &[Placement],
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Write the position of each column from its index in `column_ids`
    async fn apply_column_order(
        &mut self,
        column_ids: &[Uuid],
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
