//! Board Data Model
//!
//! Boards own ordered columns, columns own ordered cards. Both orderings are
//! dense: the non-deleted members of a parent always carry positions
//! `0..n-1` between completed operations.
//!
//! The request DTOs keep their required fields optional so that a missing
//! field surfaces as a [`SharedError::ValidationError`] from `validate()`
//! rather than as an opaque decode failure.

use crate::shared::error::SharedError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Maximum card title length in characters
pub const CARD_TITLE_MAX: usize = 200;

/// Maximum column title length in characters
pub const COLUMN_TITLE_MAX: usize = 50;

/// Background color given to boards created without one
pub const DEFAULT_BOARD_COLOR: &str = "#0079bf";

/// Columns every new board starts with, in order
pub const DEFAULT_COLUMNS: [&str; 3] = ["To Do", "In Progress", "Done"];

/// Card priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl FromStr for Priority {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(SharedError::validation(
                "priority",
                format!("unknown priority '{}'", other),
            )),
        }
    }
}

/// A board and its metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub background_color: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A column within a board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: Uuid,
    pub board_id: Uuid,
    pub title: String,
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A card within a column
///
/// `version` starts at 1 and is bumped on every successful mutation of the
/// card row itself (field edit or move). Collaborators may use it for
/// optimistic-concurrency checks; the server does not enforce it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: Uuid,
    pub column_id: Uuid,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub position: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub priority: Priority,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Card {
    /// Where this card currently sits
    pub fn placement(&self) -> Placement {
        Placement {
            card_id: self.id,
            column_id: self.column_id,
            position: self.position,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// The authoritative location of one card after a re-sequencing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub card_id: Uuid,
    pub column_id: Uuid,
    pub position: i32,
}

/// A column together with its ordered, non-deleted cards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnWithCards {
    #[serde(flatten)]
    pub column: Column,
    pub cards: Vec<Card>,
}

/// Full authoritative state of a board, used as the client refresh path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSnapshot {
    pub board: Board,
    pub columns: Vec<ColumnWithCards>,
}

impl BoardSnapshot {
    pub fn column(&self, column_id: Uuid) -> Option<&ColumnWithCards> {
        self.columns.iter().find(|c| c.column.id == column_id)
    }

    pub fn card(&self, card_id: Uuid) -> Option<&Card> {
        self.columns
            .iter()
            .flat_map(|c| c.cards.iter())
            .find(|card| card.id == card_id)
    }
}

/// Kind of state change recorded in the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    BoardCreated,
    BoardUpdated,
    ColumnCreated,
    ColumnUpdated,
    ColumnDeleted,
    ColumnsReordered,
    CardCreated,
    CardUpdated,
    CardAssigned,
    CardMoved,
    CardDeleted,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::BoardCreated => "BOARD_CREATED",
            AuditAction::BoardUpdated => "BOARD_UPDATED",
            AuditAction::ColumnCreated => "COLUMN_CREATED",
            AuditAction::ColumnUpdated => "COLUMN_UPDATED",
            AuditAction::ColumnDeleted => "COLUMN_DELETED",
            AuditAction::ColumnsReordered => "COLUMNS_REORDERED",
            AuditAction::CardCreated => "CARD_CREATED",
            AuditAction::CardUpdated => "CARD_UPDATED",
            AuditAction::CardAssigned => "CARD_ASSIGNED",
            AuditAction::CardMoved => "CARD_MOVED",
            AuditAction::CardDeleted => "CARD_DELETED",
        }
    }
}

impl FromStr for AuditAction {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_string()))
            .map_err(|_| SharedError::validation("action", format!("unknown audit action '{}'", s)))
    }
}

/// Entity kind an audit entry refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Board,
    Column,
    Card,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Board => "board",
            EntityType::Column => "column",
            EntityType::Card => "card",
        }
    }

    /// Capitalized name used in user-facing messages
    pub fn label(&self) -> &'static str {
        match self {
            EntityType::Board => "Board",
            EntityType::Column => "Column",
            EntityType::Card => "Card",
        }
    }
}

impl FromStr for EntityType {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "board" => Ok(EntityType::Board),
            "column" => Ok(EntityType::Column),
            "card" => Ok(EntityType::Card),
            other => Err(SharedError::validation(
                "entityType",
                format!("unknown entity type '{}'", other),
            )),
        }
    }
}

/// One immutable audit trail record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: Uuid,
    pub action: AuditAction,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub board_id: Uuid,
    pub user_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        action: AuditAction,
        entity_type: EntityType,
        entity_id: Uuid,
        board_id: Uuid,
        user_id: Uuid,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            action,
            entity_type,
            entity_id,
            board_id,
            user_id,
            changes: None,
            metadata: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_changes(mut self, changes: serde_json::Value) -> Self {
        self.changes = Some(changes);
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

fn validate_title(field: &str, title: &str, max: usize, what: &str) -> Result<(), SharedError> {
    let len = title.trim().chars().count();
    if len == 0 || title.chars().count() > max {
        return Err(SharedError::validation(
            field,
            format!("{} title must be between 1 and {} characters", what, max),
        ));
    }
    Ok(())
}

/// Body of `POST /api/boards`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBoard {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
}

impl NewBoard {
    pub fn validate(&self) -> Result<(), SharedError> {
        if self.title.trim().is_empty() {
            return Err(SharedError::validation("title", "Board title is required"));
        }
        Ok(())
    }
}

/// Body of `PUT /api/boards/{board_id}`: only present fields are applied
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
}

impl BoardPatch {
    pub fn validate(&self) -> Result<(), SharedError> {
        if self == &Self::default() {
            return Err(SharedError::validation("body", "No fields to update"));
        }
        if matches!(&self.title, Some(title) if title.trim().is_empty()) {
            return Err(SharedError::validation("title", "Board title is required"));
        }
        Ok(())
    }

    pub fn apply_to(&self, board: &mut Board) {
        if let Some(title) = &self.title {
            board.title = title.trim().to_string();
        }
        if let Some(description) = &self.description {
            board.description = description.clone();
        }
        if let Some(color) = &self.background_color {
            board.background_color = color.clone();
        }
    }
}

/// Body of `POST /api/columns`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewColumn {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub board_id: Option<Uuid>,
}

impl NewColumn {
    /// Validate and return the target board id
    pub fn validate(&self) -> Result<Uuid, SharedError> {
        let board_id = match self.board_id {
            Some(id) if !self.title.is_empty() => id,
            _ => {
                return Err(SharedError::validation(
                    "title",
                    "Title and boardId are required",
                ))
            }
        };
        validate_title("title", &self.title, COLUMN_TITLE_MAX, "Column")?;
        Ok(board_id)
    }
}

/// Body of `PUT /api/columns/{column_id}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameColumn {
    #[serde(default)]
    pub title: String,
}

impl RenameColumn {
    pub fn validate(&self) -> Result<(), SharedError> {
        validate_title("title", &self.title, COLUMN_TITLE_MAX, "Column")
    }
}

/// Body of `PUT /api/boards/{board_id}/columns/order`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderColumns {
    #[serde(default)]
    pub column_ids: Vec<Uuid>,
}

/// Body of `POST /api/cards`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCard {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub column_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

impl NewCard {
    pub fn new(title: impl Into<String>, column_id: Uuid) -> Self {
        Self {
            title: title.into(),
            column_id: Some(column_id),
            ..Self::default()
        }
    }

    /// Validate and return the target column id
    pub fn validate(&self) -> Result<Uuid, SharedError> {
        let column_id = match self.column_id {
            Some(id) if !self.title.is_empty() => id,
            _ => {
                return Err(SharedError::validation(
                    "title",
                    "Title and columnId are required",
                ))
            }
        };
        validate_title("title", &self.title, CARD_TITLE_MAX, "Card")?;
        Ok(column_id)
    }
}

/// Distinguishes "field absent" (`None`) from "field explicitly null"
/// (`Some(None)`) in partial updates.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Body of `PUT /api/cards/{card_id}`: only present fields are applied
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub assignee_id: Option<Option<Uuid>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

impl CardPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn validate(&self) -> Result<(), SharedError> {
        if self.is_empty() {
            return Err(SharedError::validation("body", "No fields to update"));
        }
        if let Some(title) = &self.title {
            validate_title("title", title, CARD_TITLE_MAX, "Card")?;
        }
        Ok(())
    }

    /// Whether applying this patch changes the card's assignee
    pub fn reassigns(&self, card: &Card) -> bool {
        matches!(self.assignee_id, Some(assignee) if assignee != card.assignee_id)
    }

    /// Apply the present fields to `card`
    pub fn apply_to(&self, card: &mut Card) {
        if let Some(title) = &self.title {
            card.title = title.trim().to_string();
        }
        if let Some(description) = &self.description {
            card.description = description.clone();
        }
        if let Some(assignee_id) = self.assignee_id {
            card.assignee_id = assignee_id;
        }
        if let Some(due_date) = self.due_date {
            card.due_date = due_date;
        }
        if let Some(labels) = &self.labels {
            card.labels = labels.clone();
        }
        if let Some(priority) = self.priority {
            card.priority = priority;
        }
    }

    /// The editable fields of `card` as they are now, for before/after audit payloads
    pub fn snapshot_of(card: &Card) -> serde_json::Value {
        serde_json::json!({
            "title": card.title,
            "description": card.description,
            "assigneeId": card.assignee_id,
            "dueDate": card.due_date,
            "labels": card.labels,
            "priority": card.priority,
        })
    }
}

/// Body of `POST /api/cards/move`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveCardRequest {
    #[serde(default)]
    pub card_id: Option<Uuid>,
    /// The column the client believed the card was in; informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_column_id: Option<Uuid>,
    #[serde(default)]
    pub target_column_id: Option<Uuid>,
    #[serde(default, alias = "targetPosition", skip_serializing_if = "Option::is_none")]
    pub new_position: Option<i64>,
}

/// A validated move request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveIntent {
    pub card_id: Uuid,
    pub target_column_id: Uuid,
    /// Requested index; negative values clamp to 0 in the ledger
    pub target_index: i64,
}

impl MoveCardRequest {
    pub fn new(card_id: Uuid, target_column_id: Uuid, new_position: i64) -> Self {
        Self {
            card_id: Some(card_id),
            source_column_id: None,
            target_column_id: Some(target_column_id),
            new_position: Some(new_position),
        }
    }

    pub fn validate(&self) -> Result<MoveIntent, SharedError> {
        match (self.card_id, self.target_column_id) {
            (Some(card_id), Some(target_column_id)) => Ok(MoveIntent {
                card_id,
                target_column_id,
                target_index: self.new_position.unwrap_or(0),
            }),
            _ => Err(SharedError::validation(
                "cardId",
                "cardId and targetColumnId are required",
            )),
        }
    }
}

/// Machine-readable error code carried in failed responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    Contended,
    ValidationError,
    PersistenceFailure,
    Unauthorized,
    UnknownConnection,
    Internal,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// JSON envelope returned by every HTTP endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub retriable: bool,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
            error: None,
            code: None,
            retriable: false,
        }
    }

    pub fn failure(code: ErrorCode, error: impl Into<String>, retriable: bool) -> Self {
        Self {
            success: false,
            data: None,
            message: None,
            error: Some(error.into()),
            code: Some(code),
            retriable,
        }
    }
}

impl ApiResponse<()> {
    /// A successful response with no data
    pub fn done(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
            error: None,
            code: None,
            retriable: false,
        }
    }
}

/// `data` of card endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardData {
    pub card: Card,
}

/// `data` of column endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnData {
    pub column: Column,
}

/// `data` of board endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardData {
    pub board: BoardSnapshot,
}

/// `data` of `GET /api/boards`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardList {
    pub boards: Vec<Board>,
}

/// `data` of the audit endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditData {
    pub entries: Vec<AuditEntry>,
}
