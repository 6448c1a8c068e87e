//! Board Error Taxonomy
//!
//! Every board operation fails with a [`BoardError`]. The variants map one to
//! one onto the error codes carried in failed API responses.

use crate::backend::locks::LockError;
use crate::backend::store::StoreError;
use crate::shared::error::SharedError;
use crate::shared::ledger::LedgerError;
use crate::shared::model::{EntityType, ErrorCode};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum BoardError {
    /// Missing, soft-deleted, or hidden from the caller by the access policy
    #[error("{} not found or access denied", .entity.label())]
    NotFound { entity: EntityType, id: Uuid },

    /// Another writer holds the lease on this entity
    #[error("Card is being edited by someone else")]
    Contended { id: Uuid },

    #[error(transparent)]
    Validation(#[from] SharedError),

    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

impl BoardError {
    pub fn not_found(entity: EntityType, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(SharedError::validation(field, message))
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            BoardError::NotFound { .. } => ErrorCode::NotFound,
            BoardError::Contended { .. } => ErrorCode::Contended,
            BoardError::Validation(_) => ErrorCode::ValidationError,
            BoardError::Persistence(_) => ErrorCode::PersistenceFailure,
        }
    }

    /// Whether the same request may succeed if sent again unchanged
    pub fn retriable(&self) -> bool {
        matches!(self, BoardError::Contended { .. })
    }

    /// Message safe to show to the caller
    pub fn public_message(&self) -> String {
        match self {
            BoardError::Validation(SharedError::ValidationError { message, .. }) => message.clone(),
            BoardError::Persistence(_) => "Failed to save changes".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<LockError> for BoardError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::Contended { entity_id } => BoardError::Contended { id: entity_id },
            LockError::Store(e) => BoardError::Persistence(e),
        }
    }
}

impl From<LedgerError> for BoardError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::CardNotInColumn { card_id, .. } => {
                BoardError::not_found(EntityType::Card, card_id)
            }
            LedgerError::InvalidOrder(message) => BoardError::validation("columnIds", message),
        }
    }
}
