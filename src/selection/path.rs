//! Pure navigation over a report tree by uid path.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::report::model::{ReportNode, Uid};

/// Selected nodes from the root downward. Holds uids only, never node
/// references, so it survives tree replacement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectionPath(Vec<Uid>);

impl SelectionPath {
    #[must_use]
    pub const fn empty() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn uids(&self) -> &[Uid] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn last(&self) -> Option<&Uid> {
        self.0.last()
    }

    /// The first `depth` elements.
    #[must_use]
    pub fn prefix(&self, depth: usize) -> Self {
        Self(self.0[..depth.min(self.0.len())].to_vec())
    }

    fn push(&mut self, uid: Uid) {
        self.0.push(uid);
    }
}

impl From<Vec<Uid>> for SelectionPath {
    fn from(uids: Vec<Uid>) -> Self {
        Self(uids)
    }
}

impl<'a> FromIterator<&'a str> for SelectionPath {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self(iter.into_iter().map(Uid::from).collect())
    }
}

impl fmt::Display for SelectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, uid) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" / ")?;
            }
            write!(f, "{uid}")?;
        }
        Ok(())
    }
}

/// Result of walking a path against a tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution<'t> {
    /// Nodes for the longest resolvable prefix, root first.
    pub nodes: Vec<&'t ReportNode>,
    /// Uids of `nodes`.
    pub valid_path: SelectionPath,
    /// Whether trailing elements had to be dropped.
    pub truncated: bool,
}

impl<'t> Resolution<'t> {
    /// Deepest resolved node.
    #[must_use]
    pub fn selected(&self) -> Option<&'t ReportNode> {
        self.nodes.last().copied()
    }
}

/// Replace everything after `prefix` with `node`.
#[must_use]
pub fn select(prefix: &SelectionPath, node: &ReportNode) -> SelectionPath {
    let mut path = prefix.clone();
    path.push(node.uid.clone());
    path
}

/// Resolve `path` against `tree`, keeping the longest prefix whose every
/// element is a child of the one before (and the first is the root).
#[must_use]
pub fn resolve<'t>(path: &SelectionPath, tree: &'t ReportNode) -> Resolution<'t> {
    let mut nodes: Vec<&'t ReportNode> = Vec::with_capacity(path.len());
    for uid in path.uids() {
        let next = match nodes.last().copied() {
            None => (tree.uid == *uid).then_some(tree),
            Some(parent) => parent.child(uid.as_str()),
        };
        match next {
            Some(node) => nodes.push(node),
            None => break,
        }
    }

    let valid_path = SelectionPath(nodes.iter().map(|n| n.uid.clone()).collect());
    Resolution {
        truncated: nodes.len() < path.len(),
        nodes,
        valid_path,
    }
}

/// Unbounded [`auto_descend_bounded`].
#[must_use]
pub fn auto_descend(path: &SelectionPath, tree: &ReportNode) -> SelectionPath {
    auto_descend_bounded(path, tree, usize::MAX)
}

/// Extend `path` while the selected node has exactly one entry and that
/// entry is a non-case node, taking at most `max_steps` steps. An empty
/// path starts at the root.
#[must_use]
pub fn auto_descend_bounded(
    path: &SelectionPath,
    tree: &ReportNode,
    max_steps: usize,
) -> SelectionPath {
    let resolution = resolve(path, tree);
    let mut extended = resolution.valid_path;
    let mut current = match resolution.nodes.last() {
        Some(node) => *node,
        None => {
            extended.push(tree.uid.clone());
            tree
        }
    };

    for _ in 0..max_steps {
        let [only] = current.entries.as_slice() else {
            break;
        };
        match only.as_node() {
            Some(child) if !child.is_case() => {
                extended.push(child.uid.clone());
                current = child;
            }
            _ => break,
        }
    }
    extended
}

/// One navigation column: the nodes selectable at `depth`.
#[derive(Debug, Clone, PartialEq)]
pub struct Column<'t> {
    pub depth: usize,
    pub selected: &'t Uid,
    pub siblings: Vec<&'t ReportNode>,
}

/// Column per resolved path element. Column 0 holds just the root.
#[must_use]
pub fn columns<'t>(path: &SelectionPath, tree: &'t ReportNode) -> Vec<Column<'t>> {
    let nodes = resolve(path, tree).nodes;
    nodes
        .iter()
        .copied()
        .enumerate()
        .map(|(depth, node)| Column {
            depth,
            selected: &node.uid,
            siblings: match depth {
                0 => vec![tree],
                _ => nodes[depth - 1].child_nodes().collect(),
            },
        })
        .collect()
}

/// Nodes selectable at `depth` given the first `depth` elements of `path`.
/// `None` when that prefix does not resolve.
#[must_use]
pub fn candidates<'t>(
    path: &SelectionPath,
    depth: usize,
    tree: &'t ReportNode,
) -> Option<Vec<&'t ReportNode>> {
    if depth == 0 {
        return Some(vec![tree]);
    }
    if depth > path.len() {
        return None;
    }
    let resolution = resolve(&path.prefix(depth), tree);
    if resolution.truncated {
        return None;
    }
    resolution.selected().map(|parent| parent.child_nodes().collect())
}
