//! Property-based tests for flattening and sorting.

use proptest::prelude::*;
use serde_json::Value;

use super::flatten::{FlattenedRow, RowStatus, flatten};
use super::node::{ComparisonNode, MatchState};
use super::sort::{SortMode, sort};

fn arb_state() -> impl Strategy<Value = MatchState> {
    prop_oneof![
        3 => Just(MatchState::Match),
        2 => Just(MatchState::Mismatch),
        1 => Just(MatchState::Ignored),
    ]
}

fn arb_key() -> impl Strategy<Value = String> {
    // Small alphabet so duplicate and shared-prefix keys show up.
    "[a-d]{1,2}"
}

fn arb_mapping() -> impl Strategy<Value = ComparisonNode> {
    let leaf = (arb_state(), 0i64..3, 0i64..3)
        .prop_map(|(state, e, a)| ComparisonNode::leaf(state, e, a));

    leaf.prop_recursive(4, 64, 5, |inner| {
        prop::collection::vec((arb_key(), inner), 0..5).prop_map(ComparisonNode::Mapping)
    })
    .prop_flat_map(|node| match node {
        mapping @ ComparisonNode::Mapping(_) => Just(mapping).boxed(),
        leaf => (arb_key(), Just(leaf))
            .prop_map(|(key, leaf)| ComparisonNode::Mapping(vec![(key, leaf)]))
            .boxed(),
    })
}

/// Each row's nearest shallower predecessor is its parent.
fn hierarchy_is_intact(rows: &[FlattenedRow]) -> bool {
    rows.iter().enumerate().all(|(i, row)| {
        if row.depth == 0 {
            return true;
        }
        rows[..i]
            .iter()
            .rev()
            .find(|prev| prev.depth < row.depth)
            .is_some_and(|parent| {
                parent.depth + 1 == row.depth
                    && parent.source_ref.0[..] == row.source_ref.0[..row.depth]
            })
    })
}

fn sorted_refs(rows: &[FlattenedRow]) -> Vec<Vec<usize>> {
    let mut refs: Vec<Vec<usize>> = rows.iter().map(|r| r.source_ref.0.clone()).collect();
    refs.sort();
    refs
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn container_fails_iff_a_descendant_fails(tree in arb_mapping()) {
        let rows = flatten(&tree);
        for (i, row) in rows.iter().enumerate() {
            if !row.is_container {
                prop_assert_eq!(
                    row.status.is_failed(),
                    row.match_state == Some(MatchState::Mismatch)
                );
                continue;
            }
            let subtree_failed = rows[i + 1..]
                .iter()
                .take_while(|r| r.depth > row.depth)
                .any(|r| !r.is_container && r.status == RowStatus::Failed);
            prop_assert_eq!(row.status.is_failed(), subtree_failed, "{:?}", row.key_path);
            prop_assert!(row.expected.is_none() && row.actual.is_none());
        }
    }

    #[test]
    fn flatten_is_pre_order(tree in arb_mapping()) {
        let rows = flatten(&tree);
        prop_assert!(hierarchy_is_intact(&rows));
        let refs: Vec<Vec<usize>> = rows.iter().map(|r| r.source_ref.0.clone()).collect();
        prop_assert_eq!(sorted_refs(&rows), refs);
    }

    #[test]
    fn sorting_is_stable(tree in arb_mapping()) {
        let rows = flatten(&tree);
        for mode in SortMode::ALL {
            let once = sort(&rows, mode);
            prop_assert_eq!(sort(&once, mode), once.clone(), "{}", mode);
            prop_assert!(hierarchy_is_intact(&once), "{}", mode);
        }
    }

    #[test]
    fn reordering_modes_are_permutations(tree in arb_mapping()) {
        let rows = flatten(&tree);
        for mode in [SortMode::Alphabetical, SortMode::ReverseAlphabetical, SortMode::ByStatus] {
            prop_assert_eq!(sorted_refs(&sort(&rows, mode)), sorted_refs(&rows), "{}", mode);
        }
    }

    #[test]
    fn only_failures_keeps_exactly_the_failing_rows(tree in arb_mapping()) {
        let rows = flatten(&tree);
        let kept = sort(&rows, SortMode::OnlyFailures);
        prop_assert!(kept.iter().all(|r| r.status == RowStatus::Failed));
        let failing = rows.iter().filter(|r| r.status == RowStatus::Failed).count();
        prop_assert_eq!(kept.len(), failing);
        prop_assert!(hierarchy_is_intact(&kept));
    }

    #[test]
    fn by_status_puts_failed_siblings_first(tree in arb_mapping()) {
        let sorted = sort(&flatten(&tree), SortMode::ByStatus);
        for (i, row) in sorted.iter().enumerate() {
            if row.status.is_failed() {
                continue;
            }
            // After a passed row, no later sibling under the same parent fails.
            let later_failed_sibling = sorted[i + 1..]
                .iter()
                .take_while(|r| r.depth >= row.depth)
                .filter(|r| r.depth == row.depth)
                .any(|r| r.status.is_failed());
            prop_assert!(!later_failed_sibling, "{:?}", row.key_path);
        }
    }

    #[test]
    fn by_status_depends_only_on_the_row_set(tree in arb_mapping()) {
        let rows = flatten(&tree);
        let direct = sort(&rows, SortMode::ByStatus);
        for first in SortMode::ALL {
            if first == SortMode::OnlyFailures {
                continue;
            }
            prop_assert_eq!(&sort(&sort(&rows, first), SortMode::ByStatus), &direct, "{}", first);
        }
    }

    #[test]
    fn wire_form_round_trips(tree in arb_mapping()) {
        let encoded: Value = tree.to_value();
        prop_assert_eq!(ComparisonNode::from_value(&encoded).unwrap(), tree);
    }
}
