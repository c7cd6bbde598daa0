//! Value types for report trees: nodes, assertions, statuses, aggregates.
//!
//! Trees are plain owned values. A load produces a new tree; nothing here is
//! shared or mutated in place once published, and nodes are always looked up
//! again by [`Uid`].

#![allow(missing_docs)]

use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::{Add, AddAssign};

use chrono::{DateTime, FixedOffset, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::comparison::ComparisonNode;
use crate::core::errors::ReportError;

// ──────────────────── identity ────────────────────

/// Stable node identifier, unique within one tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uid(String);

impl Uid {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Uid {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Uid {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for Uid {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ──────────────────── categories & statuses ────────────────────

/// Kind of report node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Top-level report.
    #[serde(alias = "testplan")]
    Report,
    /// Any grouping level: multitest, suite, parametrization.
    #[serde(
        alias = "multitest",
        alias = "testsuite",
        alias = "parametrization",
        alias = "suite"
    )]
    Group,
    /// A single test case; its entries are assertions.
    #[serde(alias = "testcase")]
    Case,
}

impl Category {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Report => "report",
            Self::Group => "group",
            Self::Case => "case",
        }
    }
}

/// Test outcome as displayed for a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    Error,
    Failed,
    Incomplete,
    XpassStrict,
    #[default]
    Unknown,
    Passed,
    Skipped,
    Xfail,
    Xpass,
    Unstable,
}

/// Coarse status bucket used when statuses bubble up the tree.
///
/// Variant order is precedence order: `Error` wins over everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatusCategory {
    Error,
    Failed,
    Unknown,
    Passed,
    Unstable,
}

impl Status {
    #[must_use]
    pub const fn category(self) -> StatusCategory {
        match self {
            Self::Error => StatusCategory::Error,
            Self::Failed | Self::Incomplete | Self::XpassStrict => StatusCategory::Failed,
            Self::Unknown => StatusCategory::Unknown,
            Self::Passed => StatusCategory::Passed,
            Self::Skipped | Self::Xfail | Self::Xpass | Self::Unstable => StatusCategory::Unstable,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Failed => "failed",
            Self::Incomplete => "incomplete",
            Self::XpassStrict => "xpass-strict",
            Self::Unknown => "unknown",
            Self::Passed => "passed",
            Self::Skipped => "skipped",
            Self::Xfail => "xfail",
            Self::Xpass => "xpass",
            Self::Unstable => "unstable",
        }
    }

    /// Highest-precedence category among `statuses`, if any.
    pub fn precedent(statuses: impl IntoIterator<Item = Self>) -> Option<StatusCategory> {
        statuses.into_iter().map(Self::category).min()
    }
}

impl StatusCategory {
    /// The status a parent shows when this category wins.
    #[must_use]
    pub const fn as_status(self) -> Status {
        match self {
            Self::Error => Status::Error,
            Self::Failed => Status::Failed,
            Self::Unknown => Status::Unknown,
            Self::Passed => Status::Passed,
            Self::Unstable => Status::Unstable,
        }
    }
}

/// Interactive-mode execution progress.
///
/// Variant order is precedence order: a group is `Ready` while any child is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeStatus {
    Ready,
    Running,
    Finished,
}

// ──────────────────── aggregates ────────────────────

/// Tag dimension → values.
pub type TagMap = BTreeMap<String, BTreeSet<String>>;

/// Union `from` into `into`, per dimension.
pub fn merge_tags(into: &mut TagMap, from: &TagMap) {
    for (dimension, values) in from {
        into.entry(dimension.clone())
            .or_default()
            .extend(values.iter().cloned());
    }
}

/// Passed/failed leaf-case tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Counter {
    pub passed: u64,
    pub failed: u64,
}

impl Counter {
    pub const ZERO: Self = Self {
        passed: 0,
        failed: 0,
    };

    #[must_use]
    pub const fn total(self) -> u64 {
        self.passed + self.failed
    }
}

impl Add for Counter {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            passed: self.passed + rhs.passed,
            failed: self.failed + rhs.failed,
        }
    }
}

impl AddAssign for Counter {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// One timed interval. `end` is absent while the interval is still open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub start: DateTime<Utc>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
}

impl Interval {
    /// Elapsed time, or `None` while still running.
    #[must_use]
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.end.map(|end| end - self.start)
    }
}

/// Named intervals recorded for a node (`run`, `setup`, ...). An interactive
/// report that has not started yet carries an empty timer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timer(pub BTreeMap<String, Interval>);

impl Timer {
    /// Interval name used for a node's own execution.
    pub const RUN: &'static str = "run";

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Interval> {
        self.0.get(name)
    }

    #[must_use]
    pub fn run(&self) -> Option<&Interval> {
        self.get(Self::RUN)
    }

    /// Duration of the `run` interval; duration is never stored.
    #[must_use]
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.run().and_then(Interval::duration)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Interval)> {
        self.0.iter().map(|(name, interval)| (name.as_str(), interval))
    }
}

/// Free-form diagnostic record attached to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    #[serde(default, alias = "levelname", skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ──────────────────── assertions ────────────────────

/// Kind-specific assertion content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum AssertionPayload {
    /// Structural expected-vs-actual comparison (dict/fix match).
    Comparison(ComparisonNode),
    /// Nested assertions of a group or summary.
    Group(Vec<AssertionEntry>),
    /// Any other assertion kind, kept verbatim for the render layer.
    Opaque(Map<String, Value>),
}

impl Default for AssertionPayload {
    fn default() -> Self {
        Self::Opaque(Map::new())
    }
}

/// One assertion emitted by a test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct AssertionEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_no: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utc_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine_time: Option<DateTime<FixedOffset>>,
    pub payload: AssertionPayload,
}

impl AssertionEntry {
    /// Bare assertion with an empty opaque payload.
    pub fn new(kind: impl Into<String>, passed: bool) -> Self {
        Self {
            kind: kind.into(),
            passed,
            description: None,
            line_no: None,
            utc_time: None,
            machine_time: None,
            payload: AssertionPayload::default(),
        }
    }

    /// The comparison tree, for structural-comparison kinds.
    #[must_use]
    pub fn comparison(&self) -> Option<&ComparisonNode> {
        match &self.payload {
            AssertionPayload::Comparison(tree) => Some(tree),
            _ => None,
        }
    }
}

/// Assertion kinds whose nested `entries` form a group payload.
const GROUP_KINDS: &[&str] = &["Group", "Summary"];

impl TryFrom<Map<String, Value>> for AssertionEntry {
    type Error = ReportError;

    fn try_from(mut raw: Map<String, Value>) -> Result<Self, Self::Error> {
        let kind = match raw.remove("type") {
            Some(Value::String(kind)) => kind,
            _ => return Err(ReportError::malformed("assertion entry without a string `type`")),
        };
        let passed = match raw.remove("passed") {
            None | Some(Value::Null) => true,
            Some(Value::Bool(passed)) => passed,
            Some(other) => {
                return Err(ReportError::malformed(format!(
                    "assertion `{kind}` has non-boolean `passed`: {other}"
                )));
            }
        };
        let description = take_field(&mut raw, "description")?;
        let line_no = take_field(&mut raw, "line_no")?;
        let utc_time = take_field(&mut raw, "utc_time")?;
        let machine_time = take_field(&mut raw, "machine_time")?;

        let payload = if let Some(payload) = raw.remove("payload") {
            serde_json::from_value(payload)?
        } else if GROUP_KINDS.contains(&kind.as_str()) && raw.contains_key("entries") {
            let entries = raw.remove("entries").unwrap_or(Value::Null);
            AssertionPayload::Group(serde_json::from_value(entries)?)
        } else {
            // A comparison the boundary decoder rejects stays opaque; the
            // render layer then gets an empty row set for it.
            match raw.get("comparison").map(ComparisonNode::from_value) {
                Some(Ok(tree)) => AssertionPayload::Comparison(tree),
                _ => AssertionPayload::Opaque(raw),
            }
        };

        Ok(Self {
            kind,
            passed,
            description,
            line_no,
            utc_time,
            machine_time,
            payload,
        })
    }
}

fn take_field<T: serde::de::DeserializeOwned>(
    raw: &mut Map<String, Value>,
    key: &str,
) -> Result<Option<T>, ReportError> {
    match raw.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| ReportError::malformed(format!("assertion field `{key}`: {e}"))),
    }
}

// ──────────────────── nodes ────────────────────

/// Child of a report node: a nested node or, under a case, an assertion.
///
/// Nodes always carry a `uid` and assertions never do, so decoding picks the
/// variant up front and a broken node reports its own error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Entry {
    Node(ReportNode),
    Assertion(AssertionEntry),
}

impl<'de> Deserialize<'de> for Entry {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let fields = Map::<String, Value>::deserialize(deserializer)?;
        let decoded = if fields.contains_key("uid") {
            serde_json::from_value(Value::Object(fields)).map(Self::Node)
        } else {
            serde_json::from_value(Value::Object(fields)).map(Self::Assertion)
        };
        decoded.map_err(D::Error::custom)
    }
}

impl Entry {
    #[must_use]
    pub fn as_node(&self) -> Option<&ReportNode> {
        match self {
            Self::Node(node) => Some(node),
            Self::Assertion(_) => None,
        }
    }

    #[must_use]
    pub fn as_assertion(&self) -> Option<&AssertionEntry> {
        match self {
            Self::Assertion(assertion) => Some(assertion),
            Self::Node(_) => None,
        }
    }
}

/// A report, group or case with its derived aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportNode {
    pub uid: Uid,
    pub name: String,
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub status_override: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_status: Option<RuntimeStatus>,
    #[serde(default)]
    pub tags: TagMap,
    #[serde(default)]
    pub tags_index: TagMap,
    #[serde(default)]
    pub counter: Counter,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer: Option<Timer>,
    #[serde(default)]
    pub entries: Vec<Entry>,
    #[serde(default)]
    pub logs: Vec<LogRecord>,
}

impl ReportNode {
    /// Empty node with no aggregates computed yet.
    pub fn new(uid: impl Into<Uid>, name: impl Into<String>, category: Category) -> Self {
        Self {
            uid: uid.into(),
            name: name.into(),
            category,
            description: None,
            status: Status::Unknown,
            status_override: None,
            runtime_status: None,
            tags: TagMap::new(),
            tags_index: TagMap::new(),
            counter: Counter::ZERO,
            timer: None,
            entries: Vec::new(),
            logs: Vec::new(),
        }
    }

    /// Builder-style: append a child node.
    #[must_use]
    pub fn with_child(mut self, child: Self) -> Self {
        self.entries.push(Entry::Node(child));
        self
    }

    /// Builder-style: append an assertion.
    #[must_use]
    pub fn with_assertion(mut self, assertion: AssertionEntry) -> Self {
        self.entries.push(Entry::Assertion(assertion));
        self
    }

    /// Builder-style: add a tag value under a dimension.
    #[must_use]
    pub fn with_tag(mut self, dimension: &str, value: &str) -> Self {
        self.tags
            .entry(dimension.to_owned())
            .or_default()
            .insert(value.to_owned());
        self
    }

    #[must_use]
    pub fn is_case(&self) -> bool {
        self.category == Category::Case
    }

    /// Child nodes in entry order.
    pub fn child_nodes(&self) -> impl Iterator<Item = &Self> {
        self.entries.iter().filter_map(Entry::as_node)
    }

    /// Assertions in entry order.
    pub fn assertions(&self) -> impl Iterator<Item = &AssertionEntry> {
        self.entries.iter().filter_map(Entry::as_assertion)
    }

    /// Direct child node with the given uid.
    #[must_use]
    pub fn child(&self, uid: &str) -> Option<&Self> {
        self.child_nodes().find(|c| c.uid.as_str() == uid)
    }

    /// Depth-first lookup of any node in this subtree.
    #[must_use]
    pub fn find(&self, uid: &str) -> Option<&Self> {
        if self.uid.as_str() == uid {
            return Some(self);
        }
        self.child_nodes().find_map(|c| c.find(uid))
    }

    /// Status to display: the override when set, otherwise the derived one.
    #[must_use]
    pub fn effective_status(&self) -> Status {
        self.status_override.unwrap_or(self.status)
    }

    /// Pre-order walk over every node of this subtree.
    pub fn walk(&self, visit: &mut impl FnMut(&Self, usize)) {
        self.walk_at(0, visit);
    }

    fn walk_at(&self, depth: usize, visit: &mut impl FnMut(&Self, usize)) {
        visit(self, depth);
        for child in self.child_nodes() {
            child.walk_at(depth + 1, visit);
        }
    }
}
