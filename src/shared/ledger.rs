//! Position Ledger
//!
//! Pure ordering arithmetic for cards within columns and columns within a
//! board. Every function takes the current order of the affected parent(s) as
//! read under lock and returns the complete new order; callers persist the
//! whole result. Nothing here applies a relative delta to stored positions, so
//! two commits that interleave still each leave a dense `0..n-1` sequence.

use crate::shared::model::Placement;
use std::collections::HashSet;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The card is not part of the order it is supposed to be moved out of
    #[error("card {card_id} is not in column {column_id}")]
    CardNotInColumn { card_id: Uuid, column_id: Uuid },

    /// A requested column order is not a permutation of the current one
    #[error("invalid column order: {0}")]
    InvalidOrder(String),
}

/// New order of the columns touched by a move
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    pub source_column_id: Uuid,
    pub target_column_id: Uuid,
    /// Source column order after the move; the whole column for same-column moves
    pub source: Vec<Uuid>,
    /// Target column order after the move, `None` for same-column moves
    pub target: Option<Vec<Uuid>>,
    /// Final index of the moved card in the target column
    pub new_position: i32,
    /// False when the move leaves every position unchanged
    pub changed: bool,
}

impl MoveOutcome {
    /// Placements for every card of every affected column
    pub fn placements(&self) -> Vec<Placement> {
        let mut placements = placements_for(self.source_column_id, &self.source);
        if let Some(target) = &self.target {
            placements.extend(placements_for(self.target_column_id, target));
        }
        placements
    }

    pub fn is_cross_column(&self) -> bool {
        self.target.is_some()
    }
}

/// Number each card of a column by its index
pub fn placements_for(column_id: Uuid, order: &[Uuid]) -> Vec<Placement> {
    order
        .iter()
        .enumerate()
        .map(|(index, card_id)| Placement {
            card_id: *card_id,
            column_id,
            position: index as i32,
        })
        .collect()
}

fn clamp_index(target_index: i64, len: usize) -> usize {
    target_index.clamp(0, len as i64) as usize
}

/// Re-sequence the affected columns for moving `card_id` to `target_index`.
///
/// `source` is the current order of the card's column. `target` is the
/// current order of the destination column, or `None` when the card stays in
/// its column. The index is clamped to the valid insertion range; negative
/// values clamp to 0.
pub fn reindex_after_move(
    card_id: Uuid,
    source_column_id: Uuid,
    source: &[Uuid],
    target_column_id: Uuid,
    target: Option<&[Uuid]>,
    target_index: i64,
) -> Result<MoveOutcome, LedgerError> {
    let current = source
        .iter()
        .position(|id| *id == card_id)
        .ok_or(LedgerError::CardNotInColumn {
            card_id,
            column_id: source_column_id,
        })?;

    let mut remaining: Vec<Uuid> = source.to_vec();
    remaining.remove(current);

    match target {
        None => {
            let index = clamp_index(target_index, remaining.len());
            remaining.insert(index, card_id);
            Ok(MoveOutcome {
                source_column_id,
                target_column_id: source_column_id,
                source: remaining,
                target: None,
                new_position: index as i32,
                changed: index != current,
            })
        }
        Some(target) => {
            let mut target: Vec<Uuid> = target.iter().copied().filter(|id| *id != card_id).collect();
            let index = clamp_index(target_index, target.len());
            target.insert(index, card_id);
            Ok(MoveOutcome {
                source_column_id,
                target_column_id,
                source: remaining,
                target: Some(target),
                new_position: index as i32,
                changed: true,
            })
        }
    }
}

/// Order of a column after `removed` leaves it, or `None` if it was not there
pub fn close_gap(order: &[Uuid], removed: Uuid) -> Option<Vec<Uuid>> {
    if !order.contains(&removed) {
        return None;
    }
    Some(order.iter().copied().filter(|id| *id != removed).collect())
}

/// Position for an item appended to a parent that holds `count` items
pub fn append_position(count: i64) -> i32 {
    count.max(0) as i32
}

/// Validate a requested column order against the current one.
///
/// The request must name every current column exactly once.
pub fn reorder_columns(current: &[Uuid], requested: &[Uuid]) -> Result<Vec<Uuid>, LedgerError> {
    let mut seen = HashSet::with_capacity(requested.len());
    for id in requested {
        if !seen.insert(*id) {
            return Err(LedgerError::InvalidOrder(format!("column {} listed twice", id)));
        }
    }
    let current_set: HashSet<Uuid> = current.iter().copied().collect();
    if let Some(unknown) = requested.iter().find(|id| !current_set.contains(id)) {
        return Err(LedgerError::InvalidOrder(format!(
            "column {} is not on this board",
            unknown
        )));
    }
    if requested.len() != current.len() {
        return Err(LedgerError::InvalidOrder(format!(
            "expected {} columns, got {}",
            current.len(),
            requested.len()
        )));
    }
    Ok(requested.to_vec())
}

/// True when `positions` is exactly `{0..n-1}`
pub fn is_dense(positions: impl IntoIterator<Item = i32>) -> bool {
    let mut positions: Vec<i32> = positions.into_iter().collect();
    positions.sort_unstable();
    positions
        .iter()
        .enumerate()
        .all(|(index, position)| *position == index as i32)
}
