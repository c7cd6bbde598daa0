//! Pre-order flattening of a comparison tree into display rows.

use serde::Serialize;
use serde_json::Value;

use super::node::{ComparisonNode, MatchState};

/// Pass/fail of a row; containers fail when any descendant leaf fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
    Passed,
    Failed,
}

impl RowStatus {
    #[must_use]
    pub const fn is_failed(self) -> bool {
        matches!(self, Self::Failed)
    }
}

/// Child-index path from the comparison root to the row's source node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SourceRef(pub Vec<usize>);

impl SourceRef {
    /// Follow the path back into `root`.
    #[must_use]
    pub fn resolve<'a>(&self, root: &'a ComparisonNode) -> Option<(&'a str, &'a ComparisonNode)> {
        let (last, parents) = self.0.split_last()?;
        let mut node = root;
        for &index in parents {
            node = &node.children().get(index)?.1;
        }
        let (key, child) = node.children().get(*last)?;
        Some((key.as_str(), child))
    }
}

/// One displayable line of a flattened comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlattenedRow {
    /// Nesting level; top-level keys are 0.
    pub depth: usize,
    /// Keys from the root down to and including this row.
    pub key_path: Vec<String>,
    /// `None` on container rows.
    pub expected: Option<Value>,
    /// `None` on container rows.
    pub actual: Option<Value>,
    pub status: RowStatus,
    /// Leaf verdict; `None` on container rows.
    pub match_state: Option<MatchState>,
    pub is_container: bool,
    pub source_ref: SourceRef,
}

impl FlattenedRow {
    /// Last component of the key path.
    #[must_use]
    pub fn key(&self) -> &str {
        self.key_path.last().map_or("", String::as_str)
    }
}

/// Flatten `tree` into rows in pre-order. A bare leaf root has no key and
/// yields no rows.
#[must_use]
pub fn flatten(tree: &ComparisonNode) -> Vec<FlattenedRow> {
    let mut rows = Vec::new();
    let mut key_path = Vec::new();
    let mut source = Vec::new();
    flatten_children(tree.children(), &mut key_path, &mut source, &mut rows);
    rows
}

/// Returns whether any pushed row failed.
fn flatten_children(
    children: &[(String, ComparisonNode)],
    key_path: &mut Vec<String>,
    source: &mut Vec<usize>,
    rows: &mut Vec<FlattenedRow>,
) -> bool {
    let mut any_failed = false;
    for (index, (key, child)) in children.iter().enumerate() {
        key_path.push(key.clone());
        source.push(index);
        let depth = key_path.len() - 1;

        let failed = match child {
            ComparisonNode::Leaf {
                state,
                expected,
                actual,
            } => {
                rows.push(FlattenedRow {
                    depth,
                    key_path: key_path.clone(),
                    expected: Some(expected.clone()),
                    actual: Some(actual.clone()),
                    status: status_of(state.is_failure()),
                    match_state: Some(*state),
                    is_container: false,
                    source_ref: SourceRef(source.clone()),
                });
                state.is_failure()
            }
            ComparisonNode::Mapping(grandchildren) => {
                let slot = rows.len();
                rows.push(FlattenedRow {
                    depth,
                    key_path: key_path.clone(),
                    expected: None,
                    actual: None,
                    status: RowStatus::Passed,
                    match_state: None,
                    is_container: true,
                    source_ref: SourceRef(source.clone()),
                });
                let failed = flatten_children(grandchildren, key_path, source, rows);
                rows[slot].status = status_of(failed);
                failed
            }
        };

        any_failed |= failed;
        key_path.pop();
        source.pop();
    }
    any_failed
}

const fn status_of(failed: bool) -> RowStatus {
    if failed {
        RowStatus::Failed
    } else {
        RowStatus::Passed
    }
}

/// Decode and flatten a raw comparison payload. Anything that is not a
/// well-formed tree yields an empty row set.
#[must_use]
pub fn decode_rows(raw: &Value) -> Vec<FlattenedRow> {
    ComparisonNode::from_value(raw)
        .map(|tree| flatten(&tree))
        .unwrap_or_default()
}
