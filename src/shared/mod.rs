//! Shared Module
//!
//! Types shared between the server and the client view model. Everything in
//! here is plain serializable data: board/column/card records, request and
//! response envelopes, and the tagged realtime events broadcast to board rooms.
//!
//! # Overview
//!
//! - **`model`** - Board, Column, Card and the request/response DTOs
//! - **`event`** - Tagged change and presence events
//! - **`ledger`** - Dense ordering arithmetic for cards and columns
//! - **`error`** - Validation and serialization errors
//! - **`config`** - Client configuration

/// Board, column and card records plus request DTOs
pub mod model;

/// Realtime event types
pub mod event;

/// Position arithmetic
pub mod ledger;

/// Shared error types
pub mod error;

/// Client configuration
pub mod config;

/// Re-export commonly used types for convenience
pub use model::{
    ApiResponse, AuditAction, AuditEntry, Board, BoardPatch, BoardSnapshot, Card, CardPatch,
    Column, ColumnWithCards, EntityType, ErrorCode, MoveCardRequest, MoveIntent, NewBoard,
    NewCard, NewColumn, Placement, Priority, RenameColumn, ReorderColumns,
};
pub use event::{BoardChange, ChangeEvent, PresenceEvent, PresenceUser, ServerEvent};
pub use error::SharedError;
pub use config::{ClientConfig, ClientConfigBuilder, ConfigError};
