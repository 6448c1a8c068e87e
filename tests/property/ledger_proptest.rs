//! Property-based tests for the position ledger

use boardsync::shared::ledger::{close_gap, is_dense, reindex_after_move, reorder_columns};
use proptest::prelude::*;
use std::collections::HashSet;
use uuid::Uuid;

fn ids(n: usize) -> Vec<Uuid> {
    (0..n).map(|_| Uuid::new_v4()).collect()
}

fn positions_of(order: &[Uuid], column_id: Uuid, placements: &[boardsync::shared::Placement]) -> Vec<i32> {
    placements
        .iter()
        .filter(|p| p.column_id == column_id && order.contains(&p.card_id))
        .map(|p| p.position)
        .collect()
}

proptest! {
    #[test]
    fn test_same_column_move_is_a_permutation(
        len in 1usize..12,
        pick in any::<prop::sample::Index>(),
        target in -5i64..20,
    ) {
        let column = Uuid::new_v4();
        let order = ids(len);
        let card = order[pick.index(len)];

        let outcome = reindex_after_move(card, column, &order, column, None, target).unwrap();
        prop_assert!(outcome.target.is_none());
        prop_assert_eq!(outcome.source.len(), len);

        let before: HashSet<_> = order.iter().collect();
        let after: HashSet<_> = outcome.source.iter().collect();
        prop_assert_eq!(before, after);

        let expected_index = target.clamp(0, len as i64 - 1) as usize;
        prop_assert_eq!(outcome.source[expected_index], card);
        prop_assert_eq!(outcome.new_position as usize, expected_index);
        prop_assert_eq!(outcome.changed, outcome.source != order);

        let placements = outcome.placements();
        prop_assert!(is_dense(positions_of(&outcome.source, column, &placements)));
    }

    #[test]
    fn test_cross_column_move_keeps_both_dense(
        source_len in 1usize..10,
        target_len in 0usize..10,
        pick in any::<prop::sample::Index>(),
        target_index in -3i64..15,
    ) {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let source = ids(source_len);
        let target = ids(target_len);
        let card = source[pick.index(source_len)];

        let outcome = reindex_after_move(card, a, &source, b, Some(target.as_slice()), target_index).unwrap();
        let new_target = outcome.target.clone().unwrap();

        prop_assert_eq!(outcome.source.len(), source_len - 1);
        prop_assert_eq!(new_target.len(), target_len + 1);
        prop_assert!(!outcome.source.contains(&card));
        prop_assert_eq!(new_target[outcome.new_position as usize], card);
        prop_assert!(outcome.changed);

        // Relative order of the untouched cards is preserved
        let kept: Vec<Uuid> = source.iter().copied().filter(|id| *id != card).collect();
        prop_assert_eq!(&outcome.source, &kept);
        let others: Vec<Uuid> = new_target.iter().copied().filter(|id| *id != card).collect();
        prop_assert_eq!(others, target);

        let placements = outcome.placements();
        prop_assert_eq!(placements.len(), source_len + target_len);
        prop_assert!(is_dense(positions_of(&outcome.source, a, &placements)));
        prop_assert!(is_dense(positions_of(&new_target, b, &placements)));
    }

    #[test]
    fn test_close_gap_keeps_order(len in 1usize..12, pick in any::<prop::sample::Index>()) {
        let order = ids(len);
        let removed = order[pick.index(len)];
        let remaining = close_gap(&order, removed).unwrap();
        prop_assert_eq!(remaining.len(), len - 1);
        let expected: Vec<Uuid> = order.iter().copied().filter(|id| *id != removed).collect();
        prop_assert_eq!(remaining, expected);
        prop_assert!(close_gap(&order, Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_reorder_accepts_only_permutations(len in 1usize..8, seed in any::<u64>()) {
        let current = ids(len);
        let mut shuffled = current.clone();
        let rotate = (seed as usize) % len;
        shuffled.rotate_left(rotate);
        prop_assert_eq!(reorder_columns(&current, &shuffled).unwrap(), shuffled.clone());

        let mut short = shuffled.clone();
        short.pop();
        prop_assert!(reorder_columns(&current, &short).is_err());

        let mut duplicated = shuffled.clone();
        duplicated.push(shuffled[0]);
        prop_assert!(reorder_columns(&current, &duplicated).is_err());
    }
}
