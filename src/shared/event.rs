//! Realtime Event Types
//!
//! Every event delivered over a connection's SSE stream is one of the
//! [`ServerEvent`] variants. The SSE `event:` name comes from
//! [`ServerEvent::name`] and the `data:` line is the JSON body from
//! [`ServerEvent::data`]; [`ServerEvent::from_sse`] reverses both.
//!
//! Board changes and presence updates are internally tagged by `type`, so the
//! JSON body alone is enough to decode them.

use crate::shared::error::SharedError;
use crate::shared::model::{Board, Card, CardPatch, Column, ErrorCode, Placement};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A committed state change on a board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum BoardChange {
    CardCreated {
        card: Card,
    },
    CardUpdated {
        card: Card,
        changes: CardPatch,
    },
    /// `placements` is the complete order of every affected column after the
    /// move, the moved card included
    CardMoved {
        card: Card,
        source_column_id: Uuid,
        target_column_id: Uuid,
        new_position: i32,
        placements: Vec<Placement>,
    },
    /// `placements` is the remaining order of `column_id`
    CardDeleted {
        card_id: Uuid,
        column_id: Uuid,
        placements: Vec<Placement>,
    },
    ColumnCreated {
        column: Column,
    },
    ColumnUpdated {
        column: Column,
    },
    /// `column_ids` is the remaining column order after the delete
    ColumnDeleted {
        column_id: Uuid,
        column_ids: Vec<Uuid>,
    },
    ColumnsReordered {
        column_ids: Vec<Uuid>,
    },
    BoardUpdated {
        board: Board,
    },
}

const CHANGE_NAMES: [&str; 9] = [
    "card_created",
    "card_updated",
    "card_moved",
    "card_deleted",
    "column_created",
    "column_updated",
    "column_deleted",
    "columns_reordered",
    "board_updated",
];

impl BoardChange {
    /// Wire name of this change, identical to its `type` tag
    pub fn name(&self) -> &'static str {
        match self {
            BoardChange::CardCreated { .. } => "card_created",
            BoardChange::CardUpdated { .. } => "card_updated",
            BoardChange::CardMoved { .. } => "card_moved",
            BoardChange::CardDeleted { .. } => "card_deleted",
            BoardChange::ColumnCreated { .. } => "column_created",
            BoardChange::ColumnUpdated { .. } => "column_updated",
            BoardChange::ColumnDeleted { .. } => "column_deleted",
            BoardChange::ColumnsReordered { .. } => "columns_reordered",
            BoardChange::BoardUpdated { .. } => "board_updated",
        }
    }
}

/// A [`BoardChange`] stamped with who made it and when
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub board_id: Uuid,
    pub user_id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub change: BoardChange,
}

impl ChangeEvent {
    pub fn new(board_id: Uuid, user_id: Uuid, change: BoardChange) -> Self {
        Self {
            board_id,
            user_id,
            timestamp: Utc::now(),
            change,
        }
    }
}

/// A user present in a board room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceUser {
    pub user_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub joined_at: DateTime<Utc>,
    /// Number of live connections this user has in the room
    pub connections: usize,
}

/// Who is in a board room and what they are doing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum PresenceEvent {
    /// Full roster, sent to the whole room after any membership change
    BoardUsers {
        board_id: Uuid,
        users: Vec<PresenceUser>,
    },
    UserJoined {
        board_id: Uuid,
        user: PresenceUser,
    },
    UserLeft {
        board_id: Uuid,
        user_id: Uuid,
    },
    UserTyping {
        board_id: Uuid,
        user_id: Uuid,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        card_id: Option<Uuid>,
        is_typing: bool,
    },
}

const PRESENCE_NAMES: [&str; 4] = ["board_users", "user_joined", "user_left", "user_typing"];

impl PresenceEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PresenceEvent::BoardUsers { .. } => "board_users",
            PresenceEvent::UserJoined { .. } => "user_joined",
            PresenceEvent::UserLeft { .. } => "user_left",
            PresenceEvent::UserTyping { .. } => "user_typing",
        }
    }

    pub fn board_id(&self) -> Uuid {
        match self {
            PresenceEvent::BoardUsers { board_id, .. }
            | PresenceEvent::UserJoined { board_id, .. }
            | PresenceEvent::UserLeft { board_id, .. }
            | PresenceEvent::UserTyping { board_id, .. } => *board_id,
        }
    }
}

/// Body of the `connected` event, the first event on every stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connected {
    pub connection_id: Uuid,
    pub user_id: Uuid,
}

/// Body of the `pong` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pong {
    pub timestamp: DateTime<Utc>,
}

/// Body of the `error` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorNotice {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
}

/// Anything the server pushes down a connection
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Connected(Connected),
    Change(ChangeEvent),
    Presence(PresenceEvent),
    Pong(Pong),
    Error(ErrorNotice),
}

impl ServerEvent {
    pub fn connected(connection_id: Uuid, user_id: Uuid) -> Self {
        ServerEvent::Connected(Connected {
            connection_id,
            user_id,
        })
    }

    pub fn pong() -> Self {
        ServerEvent::Pong(Pong {
            timestamp: Utc::now(),
        })
    }

    pub fn error(message: impl Into<String>, code: Option<ErrorCode>) -> Self {
        ServerEvent::Error(ErrorNotice {
            message: message.into(),
            code,
        })
    }

    /// SSE event name
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Connected(_) => "connected",
            ServerEvent::Change(event) => event.change.name(),
            ServerEvent::Presence(event) => event.name(),
            ServerEvent::Pong(_) => "pong",
            ServerEvent::Error(_) => "error",
        }
    }

    /// JSON body for the SSE `data:` field
    pub fn data(&self) -> Result<String, SharedError> {
        let json = match self {
            ServerEvent::Connected(body) => serde_json::to_string(body)?,
            ServerEvent::Change(body) => serde_json::to_string(body)?,
            ServerEvent::Presence(body) => serde_json::to_string(body)?,
            ServerEvent::Pong(body) => serde_json::to_string(body)?,
            ServerEvent::Error(body) => serde_json::to_string(body)?,
        };
        Ok(json)
    }

    /// Decode an event from its SSE name and data
    pub fn from_sse(name: &str, data: &str) -> Result<Self, SharedError> {
        let event = match name {
            "connected" => ServerEvent::Connected(serde_json::from_str(data)?),
            "pong" => ServerEvent::Pong(serde_json::from_str(data)?),
            "error" => ServerEvent::Error(serde_json::from_str(data)?),
            name if CHANGE_NAMES.contains(&name) => ServerEvent::Change(serde_json::from_str(data)?),
            name if PRESENCE_NAMES.contains(&name) => {
                ServerEvent::Presence(serde_json::from_str(data)?)
            }
            other => return Err(SharedError::unknown_event(other)),
        };
        if event.name() != name {
            return Err(SharedError::serialization(format!(
                "event name '{}' does not match payload type '{}'",
                name,
                event.name()
            )));
        }
        Ok(event)
    }

    /// The board this event concerns, if any
    pub fn board_id(&self) -> Option<Uuid> {
        match self {
            ServerEvent::Change(event) => Some(event.board_id),
            ServerEvent::Presence(event) => Some(event.board_id()),
            _ => None,
        }
    }
}

impl From<ChangeEvent> for ServerEvent {
    fn from(event: ChangeEvent) -> Self {
        ServerEvent::Change(event)
    }
}

impl From<PresenceEvent> for ServerEvent {
    fn from(event: PresenceEvent) -> Self {
        ServerEvent::Presence(event)
    }
}
