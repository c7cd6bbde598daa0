//! Re-ordering and filtering of flattened comparison rows.
//!
//! Every mode keeps the hierarchy intact: a container row is always followed
//! by its whole subtree, and children never move to another parent.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::flatten::{FlattenedRow, RowStatus};

/// How comparison rows are presented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    /// Keys ascending at every level.
    Alphabetical,
    /// Keys descending at every level; parents still precede children.
    ReverseAlphabetical,
    /// Failed siblings first, original order otherwise.
    #[default]
    ByStatus,
    /// Only failing rows and the containers that lead to them.
    OnlyFailures,
}

impl SortMode {
    pub const ALL: [Self; 4] = [
        Self::Alphabetical,
        Self::ReverseAlphabetical,
        Self::ByStatus,
        Self::OnlyFailures,
    ];

    /// Config/env label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Alphabetical => "alphabetical",
            Self::ReverseAlphabetical => "reverse_alphabetical",
            Self::ByStatus => "by_status",
            Self::OnlyFailures => "only_failures",
        }
    }

    /// Human-readable label for a sort toggle.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Alphabetical => "A-Z",
            Self::ReverseAlphabetical => "Z-A",
            Self::ByStatus => "Failures first",
            Self::OnlyFailures => "Only failures",
        }
    }

    /// Next mode in toggle order, wrapping around.
    #[must_use]
    pub const fn cycle(self) -> Self {
        match self {
            Self::Alphabetical => Self::ReverseAlphabetical,
            Self::ReverseAlphabetical => Self::ByStatus,
            Self::ByStatus => Self::OnlyFailures,
            Self::OnlyFailures => Self::Alphabetical,
        }
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == normalized)
            .ok_or_else(|| {
                format!(
                    "unknown sort mode {s:?} (expected one of: alphabetical, \
                     reverse_alphabetical, by_status, only_failures)"
                )
            })
    }
}

/// Apply `mode` to `rows`, which must be in flatten order or the output of a
/// previous `sort`.
#[must_use]
pub fn sort(rows: &[FlattenedRow], mode: SortMode) -> Vec<FlattenedRow> {
    match mode {
        SortMode::Alphabetical => by_key_path(rows, |a, b| a.cmp(b)),
        SortMode::ReverseAlphabetical => by_key_path(rows, |a, b| b.cmp(a)),
        SortMode::ByStatus => {
            let mut forest = build_forest(rows);
            order_failed_first(&mut forest, rows);
            let mut out = Vec::with_capacity(rows.len());
            emit(&forest, rows, &mut out);
            out
        }
        SortMode::OnlyFailures => {
            let forest = build_forest(rows);
            let mut out = Vec::new();
            emit_failing(&forest, rows, &mut out);
            out
        }
    }
}

/// Component-wise comparison of key paths; duplicate keys fall back to source
/// position, and a prefix sorts before its extensions.
fn by_key_path(rows: &[FlattenedRow], key_order: fn(&str, &str) -> Ordering) -> Vec<FlattenedRow> {
    let mut sorted = rows.to_vec();
    sorted.sort_by(|a, b| {
        let components = a
            .key_path
            .iter()
            .zip(&b.key_path)
            .zip(a.source_ref.0.iter().zip(&b.source_ref.0));
        for ((key_a, key_b), (src_a, src_b)) in components {
            let ord = key_order(key_a, key_b).then_with(|| src_a.cmp(src_b));
            if ord != Ordering::Equal {
                return ord;
            }
        }
        a.key_path.len().cmp(&b.key_path.len())
    });
    sorted
}

/// Row index plus its nested children, rebuilt from depths.
#[derive(Debug)]
struct RowTree {
    index: usize,
    children: Vec<RowTree>,
}

fn build_forest(rows: &[FlattenedRow]) -> Vec<RowTree> {
    let mut roots = Vec::new();
    let mut open: Vec<RowTree> = Vec::new();

    for (index, row) in rows.iter().enumerate() {
        while open
            .last()
            .is_some_and(|top| rows[top.index].depth >= row.depth)
        {
            close_top(&mut open, &mut roots);
        }
        open.push(RowTree {
            index,
            children: Vec::new(),
        });
    }
    while !open.is_empty() {
        close_top(&mut open, &mut roots);
    }
    roots
}

fn close_top(open: &mut Vec<RowTree>, roots: &mut Vec<RowTree>) {
    if let Some(done) = open.pop() {
        match open.last_mut() {
            Some(parent) => parent.children.push(done),
            None => roots.push(done),
        }
    }
}

/// Each level is ordered after its children: failed siblings first, source
/// position within each status. Input order never decides ties.
fn order_failed_first(level: &mut [RowTree], rows: &[FlattenedRow]) {
    for node in level.iter_mut() {
        order_failed_first(&mut node.children, rows);
    }
    level.sort_by_key(|node| {
        let row = &rows[node.index];
        (!row.status.is_failed(), &row.source_ref)
    });
}

fn emit(level: &[RowTree], rows: &[FlattenedRow], out: &mut Vec<FlattenedRow>) {
    for node in level {
        out.push(rows[node.index].clone());
        emit(&node.children, rows, out);
    }
}

/// Returns whether anything in `level` was kept.
fn emit_failing(level: &[RowTree], rows: &[FlattenedRow], out: &mut Vec<FlattenedRow>) -> bool {
    let mut kept_any = false;
    for node in level {
        let slot = out.len();
        out.push(rows[node.index].clone());
        let kept_below = emit_failing(&node.children, rows, out);
        if kept_below || rows[node.index].status == RowStatus::Failed {
            kept_any = true;
        } else {
            out.truncate(slot);
        }
    }
    kept_any
}
