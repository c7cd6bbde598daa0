//! Property-based tests for aggregation, merging and selection invariants.
//!
//! Trees are generated from an arbitrary shape, then uids are assigned in
//! pre-order so every generated tree is well-formed.

use std::collections::HashMap;
use std::sync::Arc;

use proptest::prelude::*;

use super::codec::{assemble_split, split_report, validate_shape};
use super::merge::{AssertionsByCase, merge};
use super::model::{
    AssertionEntry, Category, Counter, ReportNode, Status, StatusCategory, Uid,
};
use super::propagate::propagate;
use crate::selection::{
    SelectionEffect, SelectionModel, SelectionMsg, SelectionPath, auto_descend, resolve, update,
};

// ──────────────────── strategies ────────────────────

#[derive(Debug, Clone)]
enum Shape {
    Case {
        outcomes: Vec<bool>,
        status_override: Option<Status>,
        tag: Option<u8>,
    },
    Group {
        children: Vec<Shape>,
        tag: Option<u8>,
    },
}

fn arb_status() -> impl Strategy<Value = Status> {
    prop_oneof![
        Just(Status::Error),
        Just(Status::Failed),
        Just(Status::Incomplete),
        Just(Status::Skipped),
        Just(Status::Xfail),
        Just(Status::Passed),
        Just(Status::Unknown),
    ]
}

fn arb_shape() -> impl Strategy<Value = Shape> {
    let case = (
        prop::collection::vec(any::<bool>(), 0..4),
        prop::option::weighted(0.2, arb_status()),
        prop::option::of(0u8..4),
    )
        .prop_map(|(outcomes, status_override, tag)| Shape::Case {
            outcomes,
            status_override,
            tag,
        });

    case.prop_recursive(4, 48, 5, |inner| {
        (prop::collection::vec(inner, 0..5), prop::option::of(0u8..4))
            .prop_map(|(children, tag)| Shape::Group { children, tag })
    })
}

fn arb_tree() -> impl Strategy<Value = ReportNode> {
    prop::collection::vec(arb_shape(), 0..5).prop_map(|shapes| {
        let mut next = 0usize;
        shapes.iter().fold(
            ReportNode::new("root", "Plan", Category::Report),
            |root, shape| root.with_child(build(shape, &mut next)),
        )
    })
}

fn build(shape: &Shape, next: &mut usize) -> ReportNode {
    *next += 1;
    let uid = format!("n{next}");
    match shape {
        Shape::Case {
            outcomes,
            status_override,
            tag,
        } => {
            let mut node = outcomes.iter().fold(
                ReportNode::new(uid.as_str(), uid.as_str(), Category::Case),
                |node, &passed| node.with_assertion(AssertionEntry::new("Equal", passed)),
            );
            node.status_override = *status_override;
            with_optional_tag(node, *tag)
        }
        Shape::Group { children, tag } => {
            let node = children.iter().fold(
                ReportNode::new(uid.as_str(), uid.as_str(), Category::Group),
                |node, child| node.with_child(build(child, next)),
            );
            with_optional_tag(node, *tag)
        }
    }
}

fn with_optional_tag(node: ReportNode, tag: Option<u8>) -> ReportNode {
    match tag {
        Some(t) => node.with_tag("simple", &format!("t{t}")),
        None => node,
    }
}

fn all_nodes(tree: &ReportNode) -> Vec<&ReportNode> {
    let mut out = Vec::new();
    collect(tree, &mut out);
    out
}

fn collect<'a>(node: &'a ReportNode, out: &mut Vec<&'a ReportNode>) {
    out.push(node);
    for child in node.child_nodes() {
        collect(child, out);
    }
}

// ──────────────────── properties ────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn counters_are_additive(tree in arb_tree()) {
        let tree = propagate(tree);
        for node in all_nodes(&tree) {
            if node.is_case() {
                prop_assert!(node.counter.total() <= 1);
                continue;
            }
            let sum = node
                .child_nodes()
                .fold(Counter::ZERO, |acc, child| acc + child.counter);
            prop_assert_eq!(node.counter, sum, "node {}", node.uid);
        }

        let scored = all_nodes(&tree)
            .into_iter()
            .filter(|n| n.is_case() && n.assertions().next().is_some())
            .count() as u64;
        prop_assert_eq!(tree.counter.total(), scored);
    }

    #[test]
    fn statuses_follow_precedence(tree in arb_tree()) {
        let tree = propagate(tree);
        for node in all_nodes(&tree) {
            if node.is_case() || node.status_override.is_some() {
                continue;
            }
            let expected = Status::precedent(node.child_nodes().map(ReportNode::effective_status))
                .map_or(Status::Unknown, StatusCategory::as_status);
            prop_assert_eq!(node.status, expected, "node {}", node.uid);
        }

        let any_error = all_nodes(&tree).iter().any(|n| n.status == Status::Error);
        prop_assert_eq!(any_error, tree.status == Status::Error);
    }

    #[test]
    fn tags_index_covers_subtree(tree in arb_tree()) {
        let tree = propagate(tree);
        for node in all_nodes(&tree) {
            for (dimension, values) in &node.tags {
                prop_assert!(node.tags_index.get(dimension).is_some_and(|v| v.is_superset(values)));
            }
            for child in node.child_nodes() {
                for (dimension, values) in &child.tags_index {
                    prop_assert!(
                        node.tags_index.get(dimension).is_some_and(|v| v.is_superset(values)),
                        "{} misses {}'s {}", node.uid, child.uid, dimension
                    );
                }
            }
        }
    }

    #[test]
    fn propagate_is_idempotent(tree in arb_tree()) {
        let once = propagate(tree);
        let twice = propagate(once.clone());
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn split_merge_restores_tree(tree in arb_tree()) {
        prop_assume!(validate_shape(&tree).is_ok());
        let parts = split_report(tree.clone());
        let structure = assemble_split(parts.header, parts.structure).unwrap();
        let merged = merge(structure, &parts.assertions);
        prop_assert!(merged.diagnostics.is_empty(), "{:?}", merged.diagnostics);
        prop_assert_eq!(merged.report, propagate(tree));
    }

    #[test]
    fn merge_ignores_map_construction_order(tree in arb_tree()) {
        let parts = split_report(tree);
        let structure = assemble_split(parts.header, parts.structure).unwrap();

        let mut pairs: Vec<(Uid, Vec<AssertionEntry>)> = parts.assertions.into_iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        let forward: AssertionsByCase = pairs.iter().cloned().collect();
        let backward: AssertionsByCase = pairs.iter().rev().cloned().collect();

        prop_assert_eq!(merge(structure.clone(), &forward), merge(structure, &backward));
    }

    #[test]
    fn orphaned_payload_does_not_touch_tree(tree in arb_tree(), outcomes in prop::collection::vec(any::<bool>(), 1..3)) {
        let parts = split_report(tree);
        let structure = assemble_split(parts.header, parts.structure).unwrap();
        let mut noisy: AssertionsByCase = parts.assertions.clone();
        noisy.insert(
            Uid::from("not-in-tree"),
            outcomes.into_iter().map(|p| AssertionEntry::new("Equal", p)).collect(),
        );

        let clean = merge(structure.clone(), &parts.assertions);
        let merged = merge(structure, &noisy);
        prop_assert_eq!(&clean.report, &merged.report);
        prop_assert_eq!(merged.diagnostics.len(), clean.diagnostics.len() + 1);
    }

    #[test]
    fn auto_descended_path_always_resolves(tree in arb_tree()) {
        let tree = propagate(tree);
        let path = auto_descend(&SelectionPath::empty(), &tree);
        let resolution = resolve(&path, &tree);
        prop_assert!(!resolution.truncated);
        prop_assert_eq!(resolution.valid_path, path.clone());
        if let Some(last) = resolution.nodes.last() {
            prop_assert!(last.entries.len() != 1 || last.child_nodes().all(ReportNode::is_case));
        }
    }

    #[test]
    fn identical_reload_keeps_selection(tree in arb_tree(), picks in prop::collection::vec(0usize..6, 0..6)) {
        let tree = Arc::new(propagate(tree));
        let mut model = SelectionModel::default();
        update(&mut model, SelectionMsg::Loaded(Arc::clone(&tree)));

        // Walk down by picking children from arbitrary positions.
        for pick in picks {
            let depth = model.path().len();
            let Some(parent) = model.selected() else { break };
            let children: Vec<Uid> = parent.child_nodes().map(|c| c.uid.clone()).collect();
            if children.is_empty() {
                break;
            }
            let uid = children[pick % children.len()].clone();
            let effect = update(&mut model, SelectionMsg::Select { depth, uid });
            prop_assert_eq!(effect, SelectionEffect::None);
        }

        let before = model.path().clone();
        let copy: ReportNode = (*tree).clone();
        let effect = update(&mut model, SelectionMsg::Loaded(Arc::new(copy)));
        prop_assert_eq!(effect, SelectionEffect::None);
        prop_assert_eq!(model.path(), &before);
        prop_assert!(!resolve(model.path(), model.tree().unwrap()).truncated);
    }
}

#[test]
fn generated_trees_have_unique_uids() {
    let shape = Shape::Group {
        children: vec![
            Shape::Case {
                outcomes: vec![true],
                status_override: None,
                tag: None,
            },
            Shape::Group {
                children: vec![Shape::Case {
                    outcomes: vec![],
                    status_override: None,
                    tag: Some(1),
                }],
                tag: None,
            },
        ],
        tag: None,
    };
    let mut next = 0;
    let tree = ReportNode::new("root", "Plan", Category::Report).with_child(build(&shape, &mut next));
    assert!(validate_shape(&tree).is_ok());

    let mut seen: HashMap<String, usize> = HashMap::new();
    for node in all_nodes(&tree) {
        *seen.entry(node.uid.to_string()).or_default() += 1;
    }
    assert!(seen.values().all(|&n| n == 1));
}
