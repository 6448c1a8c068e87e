//! Access Policy
//!
//! Decides whether a user may see and change a board. The policy is checked
//! after the entity has been loaded; a denial is reported exactly like a
//! missing entity.

use crate::shared::error::SharedError;
use crate::shared::model::Board;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

pub trait AccessPolicy: Send + Sync {
    fn can_access(&self, user_id: Uuid, board: &Board) -> bool;

    fn name(&self) -> &'static str;
}

/// Only the board owner
#[derive(Debug, Clone, Copy, Default)]
pub struct OwnerOnly;

impl AccessPolicy for OwnerOnly {
    fn can_access(&self, user_id: Uuid, board: &Board) -> bool {
        board.owner_id == user_id
    }

    fn name(&self) -> &'static str {
        "owner"
    }
}

/// Any authenticated user
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyAuthenticated;

impl AccessPolicy for AnyAuthenticated {
    fn can_access(&self, _user_id: Uuid, _board: &Board) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "any"
    }
}

/// Configurable policy selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    #[default]
    Owner,
    Any,
}

impl PolicyKind {
    pub fn build(self) -> Arc<dyn AccessPolicy> {
        match self {
            PolicyKind::Owner => Arc::new(OwnerOnly),
            PolicyKind::Any => Arc::new(AnyAuthenticated),
        }
    }
}

impl FromStr for PolicyKind {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "owner" => Ok(PolicyKind::Owner),
            "any" => Ok(PolicyKind::Any),
            other => Err(SharedError::validation(
                "ACCESS_POLICY",
                format!("expected 'owner' or 'any', got '{}'", other),
            )),
        }
    }
}
