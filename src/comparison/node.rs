//! Comparison trees and their nested-array wire form.
//!
//! A mapping is an array of entries. Each entry is either a leaf
//! `[key, match, expected, actual]` or a nested mapping `[key, [entries...]]`.
//! A bare leaf (only ever seen at the root) is `[match, expected, actual]`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::core::errors::{ReportError, Result};

/// Per-leaf verdict from the assertion producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchState {
    Match,
    Mismatch,
    Ignored,
}

impl MatchState {
    /// Canonical wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Match => "match",
            Self::Mismatch => "mismatch",
            Self::Ignored => "ignored",
        }
    }

    /// Only an explicit mismatch fails a leaf.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::Mismatch)
    }
}

impl fmt::Display for MatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "match" | "Passed" | "passed" | "p" => Ok(Self::Match),
            "mismatch" | "Failed" | "failed" | "f" => Ok(Self::Mismatch),
            "ignored" | "Ignored" | "i" => Ok(Self::Ignored),
            other => Err(format!("unknown match state {other:?}")),
        }
    }
}

/// Expected-vs-actual comparison tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ComparisonNode {
    /// A compared value.
    Leaf {
        state: MatchState,
        expected: Value,
        actual: Value,
    },
    /// Keyed children, in producer order. Keys may repeat.
    Mapping(Vec<(String, ComparisonNode)>),
}

impl ComparisonNode {
    /// Convenience constructor for a leaf.
    pub fn leaf(state: MatchState, expected: impl Into<Value>, actual: impl Into<Value>) -> Self {
        Self::Leaf {
            state,
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Children of a mapping; empty for a leaf.
    #[must_use]
    pub fn children(&self) -> &[(String, ComparisonNode)] {
        match self {
            Self::Mapping(children) => children,
            Self::Leaf { .. } => &[],
        }
    }

    /// Decode the wire form, rejecting anything that is not tree-shaped.
    pub fn from_value(value: &Value) -> Result<Self> {
        decode_node(value, "$")
    }

    /// Encode to the wire form.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Leaf {
                state,
                expected,
                actual,
            } => Value::Array(vec![
                Value::from(state.as_str()),
                expected.clone(),
                actual.clone(),
            ]),
            Self::Mapping(children) => Value::Array(
                children
                    .iter()
                    .map(|(key, child)| encode_entry(key, child))
                    .collect(),
            ),
        }
    }
}

fn encode_entry(key: &str, child: &ComparisonNode) -> Value {
    match child {
        ComparisonNode::Leaf {
            state,
            expected,
            actual,
        } => Value::Array(vec![
            Value::from(key),
            Value::from(state.as_str()),
            expected.clone(),
            actual.clone(),
        ]),
        ComparisonNode::Mapping(_) => Value::Array(vec![Value::from(key), child.to_value()]),
    }
}

fn malformed(location: &str, details: impl Into<String>) -> ReportError {
    ReportError::MalformedComparison {
        location: location.to_owned(),
        details: details.into(),
    }
}

fn parse_state(raw: &str, location: &str) -> Result<MatchState> {
    raw.parse().map_err(|e: String| malformed(location, e))
}

fn decode_node(value: &Value, location: &str) -> Result<ComparisonNode> {
    let Value::Array(items) = value else {
        return Err(malformed(location, "expected an array"));
    };

    // Entries are always arrays, so a leading string marks a bare leaf.
    if let Some(Value::String(_)) = items.first() {
        return match items.as_slice() {
            [Value::String(state), expected, actual] => Ok(ComparisonNode::Leaf {
                state: parse_state(state, location)?,
                expected: expected.clone(),
                actual: actual.clone(),
            }),
            _ => Err(malformed(
                location,
                format!("bare leaf needs 3 elements, found {}", items.len()),
            )),
        };
    }

    let mut children = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let here = format!("{location}[{index}]");
        let Value::Array(parts) = item else {
            return Err(malformed(&here, "entry is not an array"));
        };
        let child = match parts.as_slice() {
            [Value::String(key), Value::String(state), expected, actual] => (
                key.clone(),
                ComparisonNode::Leaf {
                    state: parse_state(state, &here)?,
                    expected: expected.clone(),
                    actual: actual.clone(),
                },
            ),
            [Value::String(key), nested @ Value::Array(_)] => {
                (key.clone(), decode_node(nested, &here)?)
            }
            [non_key, ..] if !non_key.is_string() => {
                return Err(malformed(&here, "entry key is not a string"));
            }
            _ => {
                return Err(malformed(
                    &here,
                    format!("entry has unexpected shape ({} elements)", parts.len()),
                ));
            }
        };
        children.push(child);
    }
    Ok(ComparisonNode::Mapping(children))
}

impl Serialize for ComparisonNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ComparisonNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).map_err(serde::de::Error::custom)
    }
}
