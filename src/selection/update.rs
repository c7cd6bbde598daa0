//! Pure update function for selection state.

use std::sync::Arc;

use super::model::{RejectReason, SelectionEffect, SelectionModel, SelectionMsg, SelectionOptions};
use super::path::{SelectionPath, auto_descend_bounded, candidates, resolve, select};
use crate::report::model::{ReportNode, Uid};

/// Apply `msg` to `model` and report what happened.
///
/// Every transition keeps the path resolvable against the current tree.
pub fn update(model: &mut SelectionModel, msg: SelectionMsg) -> SelectionEffect {
    match msg {
        SelectionMsg::Loaded(tree) => on_loaded(model, tree),
        SelectionMsg::Select { depth, uid } => on_select(model, depth, uid),
        SelectionMsg::Clear => {
            let Some(tree) = model.tree.clone() else {
                return SelectionEffect::Rejected(RejectReason::NoReport);
            };
            model.path = descend(model.options, &SelectionPath::empty(), &tree);
            SelectionEffect::None
        }
    }
}

fn on_loaded(model: &mut SelectionModel, tree: Arc<ReportNode>) -> SelectionEffect {
    let previous = std::mem::take(&mut model.path);
    model.tree = Some(Arc::clone(&tree));

    if previous.is_empty() {
        model.path = descend(model.options, &previous, &tree);
        return SelectionEffect::None;
    }

    let resolution = resolve(&previous, &tree);
    if resolution.nodes.is_empty() {
        // Root replaced: start over as for a first load.
        model.path = descend(model.options, &SelectionPath::empty(), &tree);
        return SelectionEffect::Truncated {
            dropped: previous.uids().to_vec(),
        };
    }

    let kept = resolution.valid_path.len();
    model.path = resolution.valid_path;
    let dropped: Vec<Uid> = previous.uids()[kept..].to_vec();
    if dropped.is_empty() {
        SelectionEffect::None
    } else {
        SelectionEffect::Truncated { dropped }
    }
}

fn on_select(model: &mut SelectionModel, depth: usize, uid: Uid) -> SelectionEffect {
    let Some(tree) = model.tree.clone() else {
        return SelectionEffect::Rejected(RejectReason::NoReport);
    };
    let out_of_range = || {
        SelectionEffect::Rejected(RejectReason::DepthOutOfRange {
            depth,
            max: model.path.len(),
        })
    };

    let Some(siblings) = candidates(&model.path, depth, &tree) else {
        return out_of_range();
    };
    let Some(node) = siblings.into_iter().find(|n| n.uid == uid) else {
        return SelectionEffect::Rejected(RejectReason::NotSelectable { depth, uid });
    };

    let chosen = select(&model.path.prefix(depth), node);
    model.path = descend(model.options, &chosen, &tree);
    SelectionEffect::None
}

fn descend(options: SelectionOptions, path: &SelectionPath, tree: &ReportNode) -> SelectionPath {
    if options.auto_descend {
        auto_descend_bounded(path, tree, options.max_auto_descend)
    } else if path.is_empty() {
        SelectionPath::from(vec![tree.uid.clone()])
    } else {
        path.clone()
    }
}
