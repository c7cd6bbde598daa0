//! Merkle fingerprints over report subtrees.
//!
//! Each node gets a hash of its own displayable content and a subtree hash
//! folding in its children's subtree hashes in entry order. Comparing two
//! indexes tells a consumer which nodes need re-rendering after a reload
//! without walking both trees field by field.

#![allow(missing_docs)]

use std::collections::BTreeMap;

use serde::Serialize;
use sha2::{Digest, Sha256};

use super::model::{Entry, ReportNode, Uid};

/// 32-byte SHA-256 digest.
pub type Fingerprint = [u8; 32];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeFingerprint {
    /// Hash of the node's own fields and assertions.
    pub content: Fingerprint,
    /// Hash of `content` plus children's subtree hashes.
    pub subtree: Fingerprint,
    pub depth: usize,
}

/// Uids whose rendering differs between two trees.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FingerprintDiff {
    /// Present in both, subtree hash differs.
    pub changed: Vec<Uid>,
    pub added: Vec<Uid>,
    pub removed: Vec<Uid>,
}

impl FingerprintDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.added.is_empty() && self.removed.is_empty()
    }
}

/// Fingerprints for every node of one tree, keyed by uid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FingerprintIndex {
    nodes: BTreeMap<Uid, NodeFingerprint>,
    root: Option<Uid>,
}

impl FingerprintIndex {
    #[must_use]
    pub fn build(tree: &ReportNode) -> Self {
        let mut nodes = BTreeMap::new();
        index_node(tree, 0, &mut nodes);
        Self {
            nodes,
            root: Some(tree.uid.clone()),
        }
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn get(&self, uid: &str) -> Option<&NodeFingerprint> {
        self.nodes.get(uid)
    }

    /// Subtree hash of the root, if the index is non-empty.
    #[must_use]
    pub fn root_hash(&self) -> Option<Fingerprint> {
        self.root
            .as_ref()
            .and_then(|uid| self.nodes.get(uid))
            .map(|n| n.subtree)
    }

    /// What changed going from `self` to `newer`. Output lists are uid-sorted.
    #[must_use]
    pub fn diff(&self, newer: &Self) -> FingerprintDiff {
        let mut diff = FingerprintDiff::default();
        for (uid, fresh) in &newer.nodes {
            match self.nodes.get(uid) {
                None => diff.added.push(uid.clone()),
                Some(old) if old.subtree != fresh.subtree => diff.changed.push(uid.clone()),
                Some(_) => {}
            }
        }
        diff.removed = self
            .nodes
            .keys()
            .filter(|uid| !newer.nodes.contains_key(*uid))
            .cloned()
            .collect();
        diff
    }
}

fn index_node(
    node: &ReportNode,
    depth: usize,
    out: &mut BTreeMap<Uid, NodeFingerprint>,
) -> Fingerprint {
    let content = content_hash(node);
    let mut hasher = Sha256::new();
    hasher.update(content);
    for child in node.child_nodes() {
        hasher.update(index_node(child, depth + 1, out));
    }
    let subtree: Fingerprint = hasher.finalize().into();

    out.insert(
        node.uid.clone(),
        NodeFingerprint {
            content,
            subtree,
            depth,
        },
    );
    subtree
}

fn content_hash(node: &ReportNode) -> Fingerprint {
    let mut hasher = Sha256::new();
    update_str(&mut hasher, node.uid.as_str());
    update_str(&mut hasher, &node.name);
    update_str(&mut hasher, node.category.label());
    update_str(&mut hasher, node.description.as_deref().unwrap_or(""));
    update_str(&mut hasher, node.status.label());
    update_str(&mut hasher, node.status_override.map_or("", |s| s.label()));
    hasher.update([node.runtime_status.map_or(0, |r| r as u8 + 1)]);
    hasher.update(node.counter.passed.to_le_bytes());
    hasher.update(node.counter.failed.to_le_bytes());
    for (dimension, values) in &node.tags {
        update_str(&mut hasher, dimension);
        hasher.update((values.len() as u64).to_le_bytes());
        for value in values {
            update_str(&mut hasher, value);
        }
    }
    if let Some(timer) = &node.timer {
        for (name, interval) in timer.iter() {
            update_str(&mut hasher, name);
            hasher.update(interval.start.timestamp_micros().to_le_bytes());
            hasher.update(interval.end.map_or(i64::MIN, |e| e.timestamp_micros()).to_le_bytes());
        }
    }
    for entry in &node.entries {
        if let Entry::Assertion(assertion) = entry {
            update_json(&mut hasher, assertion);
        }
    }
    for record in &node.logs {
        update_json(&mut hasher, record);
    }
    hasher.finalize().into()
}

/// Length-prefixed so adjacent fields cannot run together.
fn update_str(hasher: &mut Sha256, value: &str) {
    hasher.update((value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}

fn update_json(hasher: &mut Sha256, value: &impl Serialize) {
    match serde_json::to_vec(value) {
        Ok(bytes) => {
            hasher.update((bytes.len() as u64).to_le_bytes());
            hasher.update(&bytes);
        }
        Err(_) => hasher.update(u64::MAX.to_le_bytes()),
    }
}

/// Format a fingerprint as lowercase hex.
#[must_use]
pub fn hash_hex(hash: &Fingerprint) -> String {
    use std::fmt::Write;
    hash.iter().fold(String::with_capacity(64), |mut acc, b| {
        let _ = write!(acc, "{b:02x}");
        acc
    })
}
