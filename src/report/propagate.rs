//! Bottom-up aggregation of counters, statuses, tags and runtime state.

use super::model::{
    Category, Counter, Entry, ReportNode, RuntimeStatus, Status, StatusCategory, merge_tags,
};

/// Recompute every derived field of `tree` in one post-order pass.
///
/// Input aggregates are ignored and overwritten, so running this on an
/// already-propagated tree is a no-op.
#[must_use]
pub fn propagate(mut tree: ReportNode) -> ReportNode {
    propagate_node(&mut tree);
    tree
}

fn propagate_node(node: &mut ReportNode) {
    let mut tags_index = node.tags.clone();

    let derived = if node.category == Category::Case {
        let (counter, status) = case_outcome(node);
        node.counter = counter;
        status
    } else {
        let mut counter = Counter::ZERO;
        let mut worst: Option<StatusCategory> = None;
        let mut runtime: Option<RuntimeStatus> = None;

        for entry in &mut node.entries {
            let Entry::Node(child) = entry else { continue };
            propagate_node(child);

            counter += child.counter;
            merge_tags(&mut tags_index, &child.tags_index);
            let category = child.effective_status().category();
            worst = Some(worst.map_or(category, |w| w.min(category)));
            if let Some(child_runtime) = child.runtime_status {
                runtime = Some(runtime.map_or(child_runtime, |r| r.min(child_runtime)));
            }
        }

        node.counter = counter;
        if runtime.is_some() {
            node.runtime_status = runtime;
        }
        worst.map_or(Status::Unknown, StatusCategory::as_status)
    };

    node.status = node.status_override.unwrap_or(derived);
    node.tags_index = tags_index;
}

/// A case with no assertions contributes nothing and stays unknown.
fn case_outcome(case: &ReportNode) -> (Counter, Status) {
    let mut any = false;
    let mut failed = false;
    for assertion in case.assertions() {
        any = true;
        failed |= !assertion.passed;
    }

    match (any, failed) {
        (false, _) => (Counter::ZERO, Status::Unknown),
        (true, true) => (
            Counter {
                passed: 0,
                failed: 1,
            },
            Status::Failed,
        ),
        (true, false) => (
            Counter {
                passed: 1,
                failed: 0,
            },
            Status::Passed,
        ),
    }
}
