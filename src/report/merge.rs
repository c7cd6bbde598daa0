//! Re-attach separately shipped assertions to the structure tree.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use serde::Serialize;

use super::model::{AssertionEntry, Category, Entry, ReportNode, Uid};
use super::propagate::propagate;

/// Assertions keyed by the uid of the case that produced them.
pub type AssertionsByCase = HashMap<Uid, Vec<AssertionEntry>>;

/// Knobs for [`merge_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOptions {
    /// Emit [`IntegrityViolation::MissingPayload`] for cases with no entry.
    pub report_missing_payloads: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            report_missing_payloads: true,
        }
    }
}

/// Mismatch between the structure and the assertion map. None of these
/// abort a merge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "uid", rename_all = "snake_case")]
pub enum IntegrityViolation {
    /// Assertions keyed by a uid that is nowhere in the structure.
    OrphanedPayload(Uid),
    /// Assertions keyed by a group or report uid.
    NotACase(Uid),
    /// A case with no entry in the assertion map.
    MissingPayload(Uid),
    /// A structure case that already carried assertions; they were replaced.
    PrepopulatedCase(Uid),
}

impl IntegrityViolation {
    #[must_use]
    pub fn uid(&self) -> &Uid {
        match self {
            Self::OrphanedPayload(uid)
            | Self::NotACase(uid)
            | Self::MissingPayload(uid)
            | Self::PrepopulatedCase(uid) => uid,
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::OrphanedPayload(_) => "orphaned_payload",
            Self::NotACase(_) => "not_a_case",
            Self::MissingPayload(_) => "missing_payload",
            Self::PrepopulatedCase(_) => "prepopulated_case",
        }
    }
}

impl fmt::Display for IntegrityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label(), self.uid())
    }
}

/// A merged, propagated tree plus whatever did not line up.
#[derive(Debug, Clone, PartialEq)]
pub struct Merged {
    pub report: ReportNode,
    pub diagnostics: Vec<IntegrityViolation>,
}

/// [`merge_with`] using default options.
#[must_use]
pub fn merge(structure: ReportNode, assertions: &AssertionsByCase) -> Merged {
    merge_with(structure, assertions, MergeOptions::default())
}

/// Splice each case's assertions into `structure`, then propagate.
///
/// Diagnostics come out in structure walk order, followed by unmatched map
/// keys sorted by uid, so identical inputs give identical output.
#[must_use]
pub fn merge_with(
    mut structure: ReportNode,
    assertions: &AssertionsByCase,
    options: MergeOptions,
) -> Merged {
    let mut walk = Walk {
        assertions,
        options,
        consumed: HashSet::new(),
        non_cases: HashSet::new(),
        diagnostics: Vec::new(),
    };
    walk.visit(&mut structure);

    let Walk {
        consumed,
        non_cases,
        mut diagnostics,
        ..
    } = walk;

    let leftovers: BTreeSet<&Uid> = assertions
        .keys()
        .filter(|uid| !consumed.contains(*uid))
        .collect();
    for uid in leftovers {
        diagnostics.push(if non_cases.contains(uid) {
            IntegrityViolation::NotACase(uid.clone())
        } else {
            IntegrityViolation::OrphanedPayload(uid.clone())
        });
    }

    Merged {
        report: propagate(structure),
        diagnostics,
    }
}

struct Walk<'a> {
    assertions: &'a AssertionsByCase,
    options: MergeOptions,
    consumed: HashSet<&'a Uid>,
    non_cases: HashSet<Uid>,
    diagnostics: Vec<IntegrityViolation>,
}

impl<'a> Walk<'a> {
    fn visit(&mut self, node: &mut ReportNode) {
        if node.category != Category::Case {
            self.non_cases.insert(node.uid.clone());
            for entry in &mut node.entries {
                if let Entry::Node(child) = entry {
                    self.visit(child);
                }
            }
            return;
        }

        match self.assertions.get_key_value(&node.uid) {
            Some((key, payload)) => {
                if node.assertions().next().is_some() {
                    self.diagnostics
                        .push(IntegrityViolation::PrepopulatedCase(node.uid.clone()));
                }
                self.consumed.insert(key);
                node.entries = payload.iter().cloned().map(Entry::Assertion).collect();
            }
            None => {
                if self.options.report_missing_payloads {
                    self.diagnostics
                        .push(IntegrityViolation::MissingPayload(node.uid.clone()));
                }
            }
        }
    }
}
