//! Postgres board store
//!
//! Rows are mapped by hand from `PgRow`. Board and column row locks are
//! `SELECT ... FOR UPDATE` inside the open transaction.

use super::{BoardStore, StoreError, StoreTx};
use crate::shared::model::{
    AuditEntry, Board, BoardSnapshot, Card, Column, ColumnWithCards, Placement, Priority,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use uuid::Uuid;

const BOARD_FIELDS: &str =
    "id, owner_id, title, description, background_color, created_at, updated_at";

const COLUMN_FIELDS: &str = "id, board_id, title, position, created_at, updated_at, deleted_at";

const CARD_FIELDS: &str = "id, column_id, title, description, position, assignee_id, due_date, \
     labels, priority, version, created_at, updated_at, deleted_at";

const AUDIT_FIELDS: &str =
    "id, action, entity_type, entity_id, board_id, user_id, changes, metadata, created_at";

fn board_from_row(row: &PgRow) -> Result<Board, StoreError> {
    Ok(Board {
        id: row.try_get("id")?,
        owner_id: row.try_get("owner_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        background_color: row.try_get("background_color")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn column_from_row(row: &PgRow) -> Result<Column, StoreError> {
    Ok(Column {
        id: row.try_get("id")?,
        board_id: row.try_get("board_id")?,
        title: row.try_get("title")?,
        position: row.try_get("position")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

fn card_from_row(row: &PgRow) -> Result<Card, StoreError> {
    let priority: String = row.try_get("priority")?;
    Ok(Card {
        id: row.try_get("id")?,
        column_id: row.try_get("column_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        position: row.try_get("position")?,
        assignee_id: row.try_get("assignee_id")?,
        due_date: row.try_get("due_date")?,
        labels: row.try_get("labels")?,
        priority: priority
            .parse::<Priority>()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?,
        version: row.try_get("version")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

fn audit_from_row(row: &PgRow) -> Result<AuditEntry, StoreError> {
    let action: String = row.try_get("action")?;
    let entity_type: String = row.try_get("entity_type")?;
    Ok(AuditEntry {
        id: row.try_get("id")?,
        action: action
            .parse()
            .map_err(|e: crate::shared::SharedError| StoreError::Corrupt(e.to_string()))?,
        entity_type: entity_type
            .parse()
            .map_err(|e: crate::shared::SharedError| StoreError::Corrupt(e.to_string()))?,
        entity_id: row.try_get("entity_id")?,
        board_id: row.try_get("board_id")?,
        user_id: row.try_get("user_id")?,
        changes: row.try_get("changes")?,
        metadata: row.try_get("metadata")?,
        created_at: row.try_get("created_at")?,
    })
}

/// [`BoardStore`] backed by a Postgres pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `database_url` with a pool of at most `max_connections`
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        tracing::info!("[Store] Connecting to database...");
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        tracing::info!("[Store] Database connection pool created");
        Ok(Self { pool })
    }

    /// Apply the bundled migrations
    pub async fn migrate(&self) -> Result<(), StoreError> {
        tracing::info!("[Store] Running database migrations...");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("[Store] Database migrations completed");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn ordered_columns(&self, board_id: Uuid) -> Result<Vec<Column>, StoreError> {
        let sql = format!(
            "SELECT {} FROM columns WHERE board_id = $1 AND deleted_at IS NULL \
             ORDER BY position, created_at",
            COLUMN_FIELDS
        );
        let rows = sqlx::query(&sql).bind(board_id).fetch_all(&self.pool).await?;
        rows.iter().map(column_from_row).collect()
    }
}

#[async_trait]
impl BoardStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn board(&self, board_id: Uuid) -> Result<Option<Board>, StoreError> {
        let sql = format!("SELECT {} FROM boards WHERE id = $1", BOARD_FIELDS);
        let row = sqlx::query(&sql)
            .bind(board_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(board_from_row).transpose()
    }

    async fn boards_for_owner(&self, owner_id: Uuid) -> Result<Vec<Board>, StoreError> {
        let sql = format!(
            "SELECT {} FROM boards WHERE owner_id = $1 ORDER BY created_at DESC",
            BOARD_FIELDS
        );
        let rows = sqlx::query(&sql).bind(owner_id).fetch_all(&self.pool).await?;
        rows.iter().map(board_from_row).collect()
    }

    async fn column(&self, column_id: Uuid) -> Result<Option<Column>, StoreError> {
        let sql = format!(
            "SELECT {} FROM columns WHERE id = $1 AND deleted_at IS NULL",
            COLUMN_FIELDS
        );
        let row = sqlx::query(&sql)
            .bind(column_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(column_from_row).transpose()
    }

    async fn card(&self, card_id: Uuid) -> Result<Option<Card>, StoreError> {
        let sql = format!(
            "SELECT {} FROM cards WHERE id = $1 AND deleted_at IS NULL",
            CARD_FIELDS
        );
        let row = sqlx::query(&sql)
            .bind(card_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(card_from_row).transpose()
    }

    async fn snapshot(&self, board_id: Uuid) -> Result<Option<BoardSnapshot>, StoreError> {
        let Some(board) = self.board(board_id).await? else {
            return Ok(None);
        };
        let columns = self.ordered_columns(board_id).await?;

        let sql = format!(
            "SELECT {} FROM cards \
             WHERE column_id = ANY($1) AND deleted_at IS NULL \
             ORDER BY position, created_at",
            CARD_FIELDS
        );
        let column_ids: Vec<Uuid> = columns.iter().map(|c| c.id).collect();
        let rows = sqlx::query(&sql)
            .bind(&column_ids)
            .fetch_all(&self.pool)
            .await?;
        let cards = rows.iter().map(card_from_row).collect::<Result<Vec<_>, _>>()?;

        let columns = columns
            .into_iter()
            .map(|column| {
                let cards = cards
                    .iter()
                    .filter(|card| card.column_id == column.id)
                    .cloned()
                    .collect();
                ColumnWithCards { column, cards }
            })
            .collect();
        Ok(Some(BoardSnapshot { board, columns }))
    }

    async fn append_audit(&self, entry: &AuditEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (id, action, entity_type, entity_id, board_id, user_id, changes, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(entry.id)
        .bind(entry.action.as_str())
        .bind(entry.entity_type.as_str())
        .bind(entry.entity_id)
        .bind(entry.board_id)
        .bind(entry.user_id)
        .bind(&entry.changes)
        .bind(&entry.metadata)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn audit_trail(&self, board_id: Uuid, limit: i64) -> Result<Vec<AuditEntry>, StoreError> {
        let sql = format!(
            "SELECT {} FROM audit_logs WHERE board_id = $1 ORDER BY created_at DESC LIMIT $2",
            AUDIT_FIELDS
        );
        let rows = sqlx::query(&sql)
            .bind(board_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(audit_from_row).collect()
    }
}

struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn lock_board(&mut self, board_id: Uuid) -> Result<Option<Board>, StoreError> {
        let sql = format!("SELECT {} FROM boards WHERE id = $1 FOR UPDATE", BOARD_FIELDS);
        let row = sqlx::query(&sql)
            .bind(board_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(board_from_row).transpose()
    }

    async fn lock_column(&mut self, column_id: Uuid) -> Result<Option<Column>, StoreError> {
        let sql = format!(
            "SELECT {} FROM columns WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
            COLUMN_FIELDS
        );
        let row = sqlx::query(&sql)
            .bind(column_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(column_from_row).transpose()
    }

    async fn card(&mut self, card_id: Uuid) -> Result<Option<Card>, StoreError> {
        let sql = format!(
            "SELECT {} FROM cards WHERE id = $1 AND deleted_at IS NULL",
            CARD_FIELDS
        );
        let row = sqlx::query(&sql)
            .bind(card_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(card_from_row).transpose()
    }

    async fn lock_card(&mut self, card_id: Uuid) -> Result<Option<Card>, StoreError> {
        let sql = format!(
            "SELECT {} FROM cards WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
            CARD_FIELDS
        );
        let row = sqlx::query(&sql)
            .bind(card_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(card_from_row).transpose()
    }

    async fn board_columns(&mut self, board_id: Uuid) -> Result<Vec<Column>, StoreError> {
        let sql = format!(
            "SELECT {} FROM columns WHERE board_id = $1 AND deleted_at IS NULL \
             ORDER BY position, created_at",
            COLUMN_FIELDS
        );
        let rows = sqlx::query(&sql)
            .bind(board_id)
            .fetch_all(&mut *self.tx)
            .await?;
        rows.iter().map(column_from_row).collect()
    }

    async fn column_cards(&mut self, column_id: Uuid) -> Result<Vec<Card>, StoreError> {
        let sql = format!(
            "SELECT {} FROM cards WHERE column_id = $1 AND deleted_at IS NULL \
             ORDER BY position, created_at",
            CARD_FIELDS
        );
        let rows = sqlx::query(&sql)
            .bind(column_id)
            .fetch_all(&mut *self.tx)
            .await?;
        rows.iter().map(card_from_row).collect()
    }

    async fn count_cards(&mut self, column_id: Uuid) -> Result<i64, StoreError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS count FROM cards WHERE column_id = $1 AND deleted_at IS NULL",
        )
        .bind(column_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row.try_get("count")?)
    }

    async fn insert_board(&mut self, board: &Board) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO boards (id, owner_id, title, description, background_color, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(board.id)
        .bind(board.owner_id)
        .bind(&board.title)
        .bind(&board.description)
        .bind(&board.background_color)
        .bind(board.created_at)
        .bind(board.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_board(&mut self, board: &Board) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE boards SET title = $2, description = $3, background_color = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(board.id)
        .bind(&board.title)
        .bind(&board.description)
        .bind(&board.background_color)
        .bind(board.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_column(&mut self, column: &Column) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO columns (id, board_id, title, position, created_at, updated_at, deleted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(column.id)
        .bind(column.board_id)
        .bind(&column.title)
        .bind(column.position)
        .bind(column.created_at)
        .bind(column.updated_at)
        .bind(column.deleted_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_column(&mut self, column: &Column) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE columns SET title = $2, position = $3, deleted_at = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(column.id)
        .bind(&column.title)
        .bind(column.position)
        .bind(column.deleted_at)
        .bind(column.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_card(&mut self, card: &Card) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO cards (id, column_id, title, description, position, assignee_id, due_date,
                               labels, priority, version, created_at, updated_at, deleted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(card.id)
        .bind(card.column_id)
        .bind(&card.title)
        .bind(&card.description)
        .bind(card.position)
        .bind(card.assignee_id)
        .bind(card.due_date)
        .bind(&card.labels)
        .bind(card.priority.as_str())
        .bind(card.version)
        .bind(card.created_at)
        .bind(card.updated_at)
        .bind(card.deleted_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_card(&mut self, card: &Card) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE cards SET column_id = $2, title = $3, description = $4, position = $5,
                             assignee_id = $6, due_date = $7, labels = $8, priority = $9,
                             version = $10, updated_at = $11, deleted_at = $12
            WHERE id = $1
            "#,
        )
        .bind(card.id)
        .bind(card.column_id)
        .bind(&card.title)
        .bind(&card.description)
        .bind(card.position)
        .bind(card.assignee_id)
        .bind(card.due_date)
        .bind(&card.labels)
        .bind(card.priority.as_str())
        .bind(card.version)
        .bind(card.updated_at)
        .bind(card.deleted_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_card_fields(&mut self, card: &Card) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE cards SET title = $2, description = $3, assignee_id = $4, due_date = $5,
                             labels = $6, priority = $7, version = $8, updated_at = $9
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(card.id)
        .bind(&card.title)
        .bind(&card.description)
        .bind(card.assignee_id)
        .bind(card.due_date)
        .bind(&card.labels)
        .bind(card.priority.as_str())
        .bind(card.version)
        .bind(card.updated_at)
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Corrupt(format!("card {} vanished", card.id)));
        }
        Ok(())
    }

    async fn delete_column_cards(
        &mut self,
        column_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE cards SET deleted_at = $2, updated_at = $2 WHERE column_id = $1 AND deleted_at IS NULL",
        )
        .bind(column_id)
        .bind(at)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn apply_placements(
        &mut self,
        placements: &[Placement],
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if placements.is_empty() {
            return Ok(());
        }
        let card_ids: Vec<Uuid> = placements.iter().map(|p| p.card_id).collect();
        let column_ids: Vec<Uuid> = placements.iter().map(|p| p.column_id).collect();
        let positions: Vec<i32> = placements.iter().map(|p| p.position).collect();

        sqlx::query(
            r#"
            UPDATE cards AS c
            SET column_id = p.column_id, position = p.position, updated_at = $4
            FROM UNNEST($1::uuid[], $2::uuid[], $3::int4[]) AS p(card_id, column_id, position)
            WHERE c.id = p.card_id
              AND (c.column_id <> p.column_id OR c.position <> p.position)
            "#,
        )
        .bind(&card_ids)
        .bind(&column_ids)
        .bind(&positions)
        .bind(at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn apply_column_order(
        &mut self,
        column_ids: &[Uuid],
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if column_ids.is_empty() {
            return Ok(());
        }
        let positions: Vec<i32> = (0..column_ids.len() as i32).collect();

        sqlx::query(
            r#"
            UPDATE columns AS c
            SET position = p.position, updated_at = $3
            FROM UNNEST($1::uuid[], $2::int4[]) AS p(column_id, position)
            WHERE c.id = p.column_id AND c.position <> p.position
            "#,
        )
        .bind(column_ids)
        .bind(&positions)
        .bind(at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
