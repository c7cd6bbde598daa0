//! Elm-style state for report navigation.
//!
//! [`SelectionModel`] holds the current tree and selected path. Changes arrive
//! as [`SelectionMsg`] values and report their outcome as a
//! [`SelectionEffect`]. Nothing here performs I/O.

use std::sync::Arc;

use serde::Serialize;

use super::path::SelectionPath;
use crate::core::config::SelectionConfig;
use crate::report::model::{ReportNode, Uid};

/// Auto-descend behaviour applied on load and on selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionOptions {
    pub auto_descend: bool,
    pub max_auto_descend: usize,
}

impl Default for SelectionOptions {
    fn default() -> Self {
        Self::from(&SelectionConfig::default())
    }
}

impl From<&SelectionConfig> for SelectionOptions {
    fn from(cfg: &SelectionConfig) -> Self {
        Self {
            auto_descend: cfg.auto_descend,
            max_auto_descend: cfg.max_auto_descend,
        }
    }
}

/// Navigation state over the current report.
#[derive(Debug, Clone, Default)]
pub struct SelectionModel {
    pub(super) tree: Option<Arc<ReportNode>>,
    pub(super) path: SelectionPath,
    pub(super) options: SelectionOptions,
}

impl SelectionModel {
    #[must_use]
    pub fn new(options: SelectionOptions) -> Self {
        Self {
            tree: None,
            path: SelectionPath::empty(),
            options,
        }
    }

    #[must_use]
    pub fn tree(&self) -> Option<&Arc<ReportNode>> {
        self.tree.as_ref()
    }

    #[must_use]
    pub fn path(&self) -> &SelectionPath {
        &self.path
    }

    #[must_use]
    pub const fn options(&self) -> SelectionOptions {
        self.options
    }

    /// Deepest selected node in the current tree.
    #[must_use]
    pub fn selected(&self) -> Option<&ReportNode> {
        let tree = self.tree.as_deref()?;
        super::path::resolve(&self.path, tree).selected()
    }
}

/// Inputs to [`super::update::update`].
#[derive(Debug, Clone)]
pub enum SelectionMsg {
    /// A new tree replaced the old one.
    Loaded(Arc<ReportNode>),
    /// The user picked `uid` in column `depth`.
    Select { depth: usize, uid: Uid },
    /// Back to the root (plus auto-descend).
    Clear,
}

/// Why a message left the model untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    NoReport,
    DepthOutOfRange { depth: usize, max: usize },
    NotSelectable { depth: usize, uid: Uid },
}

/// Observable outcome of an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionEffect {
    /// Path changed (or stayed) without losing anything.
    None,
    /// A reload dropped the trailing `dropped` uids from the path.
    Truncated { dropped: Vec<Uid> },
    /// The message was ignored.
    Rejected(RejectReason),
}
