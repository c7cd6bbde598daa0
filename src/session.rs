//! Report session: generation-gated loads, selection, and activity logging.
//!
//! Loads may overlap. Each one takes a [`LoadTicket`] when it starts and only
//! applies if no newer load has applied in the meantime. Merging and
//! propagation run outside the lock; the published tree is an immutable
//! `Arc` swapped in under it, so readers never observe a half-built tree.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::comparison::{FlattenedRow, SortMode, flatten, sort};
use crate::core::config::Config;
use crate::core::errors::Result;
use crate::logger::jsonl::{EventType, JsonlWriter, LogEntry, LogSink, Severity};
use crate::report::codec::load_report_files;
use crate::report::fingerprint::{FingerprintDiff, FingerprintIndex, hash_hex};
use crate::report::merge::{AssertionsByCase, IntegrityViolation, MergeOptions, Merged, merge_with};
use crate::report::model::{AssertionEntry, ReportNode, Uid};
use crate::report::propagate::propagate;
use crate::selection::{
    SelectionEffect, SelectionModel, SelectionMsg, SelectionOptions, SelectionPath, update,
};

/// Proof that a load was started, carrying its generation.
#[derive(Debug)]
pub struct LoadTicket {
    generation: u64,
}

impl LoadTicket {
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }
}

/// Input to [`ReportSession::complete_load`].
#[derive(Debug, Clone)]
pub enum LoadPayload {
    /// A complete report; only propagation is needed.
    Complete(ReportNode),
    /// A structure tree plus assertions still to be merged in.
    Split {
        structure: ReportNode,
        assertions: AssertionsByCase,
    },
}

/// Details of a load that became current.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedLoad {
    pub generation: u64,
    pub diagnostics: Vec<IntegrityViolation>,
    pub selection: SelectionEffect,
    pub diff: FingerprintDiff,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Applied(AppliedLoad),
    /// A newer load already applied; this result was discarded.
    Stale { generation: u64, current: u64 },
}

impl LoadOutcome {
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// Point-in-time view for rendering.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// Generation of the tree below; 0 before the first load.
    pub generation: u64,
    pub tree: Option<Arc<ReportNode>>,
    pub path: SelectionPath,
}

struct SessionState {
    issued: u64,
    applied: u64,
    tree: Option<Arc<ReportNode>>,
    fingerprints: FingerprintIndex,
    selection: SelectionModel,
}

/// Owns the current report and the selection over it.
pub struct ReportSession {
    config: Config,
    state: Mutex<SessionState>,
    log: Mutex<Option<JsonlWriter>>,
}

impl ReportSession {
    /// Create a session, opening the activity log if enabled in `config`.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let writer = config.logging.jsonl_config().map(JsonlWriter::open);
        Self::with_writer(config, writer)
    }

    /// Create a session with an explicit (or no) log writer.
    #[must_use]
    pub fn with_writer(config: Config, writer: Option<JsonlWriter>) -> Self {
        let selection = SelectionModel::new(SelectionOptions::from(&config.selection));
        let session = Self {
            state: Mutex::new(SessionState {
                issued: 0,
                applied: 0,
                tree: None,
                fingerprints: FingerprintIndex::default(),
                selection,
            }),
            log: Mutex::new(writer),
            config,
        };

        let mut entry = LogEntry::new(EventType::ConfigLoaded, Severity::Info);
        entry.details = session.config.stable_hash().ok();
        session.log(&entry);
        session
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Reserve the next load generation.
    pub fn begin_load(&self) -> LoadTicket {
        let mut state = self.state.lock();
        state.issued += 1;
        LoadTicket {
            generation: state.issued,
        }
    }

    /// Finish a load started with [`Self::begin_load`]. Applies the result
    /// unless a load with a higher generation has already applied.
    pub fn complete_load(&self, ticket: LoadTicket, payload: LoadPayload) -> LoadOutcome {
        if let Some(stale) = self.check_stale(&ticket) {
            return stale;
        }

        let Merged {
            report,
            diagnostics,
        } = match payload {
            LoadPayload::Complete(report) => Merged {
                report: propagate(report),
                diagnostics: Vec::new(),
            },
            LoadPayload::Split {
                structure,
                assertions,
            } => merge_with(
                structure,
                &assertions,
                MergeOptions {
                    report_missing_payloads: self.config.merge.report_missing_payloads,
                },
            ),
        };
        let fingerprints = FingerprintIndex::build(&report);
        let root_hash = fingerprints.root_hash().map(|hash| hash_hex(&hash));
        let tree = Arc::new(report);

        let (diff, selection, path) = {
            let mut state = self.state.lock();
            if ticket.generation <= state.applied {
                let current = state.applied;
                drop(state);
                return self.discard(&ticket, current);
            }
            let diff = state.fingerprints.diff(&fingerprints);
            state.fingerprints = fingerprints;
            state.tree = Some(Arc::clone(&tree));
            state.applied = ticket.generation;
            let selection = update(&mut state.selection, SelectionMsg::Loaded(Arc::clone(&tree)));
            (diff, selection, state.selection.path().clone())
        };

        let applied = AppliedLoad {
            generation: ticket.generation,
            diagnostics,
            selection,
            diff,
        };
        self.log_applied(&applied, &tree, root_hash, &path);
        LoadOutcome::Applied(applied)
    }

    /// Read a report file (following split attachments) and apply it.
    pub fn load_file(&self, path: &Path) -> Result<LoadOutcome> {
        let ticket = self.begin_load();
        let payload = match load_report_files(path) {
            Ok((report, None)) => LoadPayload::Complete(report),
            Ok((structure, Some(assertions))) => LoadPayload::Split {
                structure,
                assertions,
            },
            Err(err) => {
                // A broken payload fails the same way on every retry.
                let severity = if err.is_payload_error() {
                    Severity::Critical
                } else {
                    Severity::Warning
                };
                let mut entry = LogEntry::new(EventType::LoadFailed, severity);
                entry.generation = Some(ticket.generation);
                entry.error_code = Some(err.code().to_owned());
                entry.details = Some(err.to_string());
                self.log(&entry);
                return Err(err);
            }
        };
        Ok(self.complete_load(ticket, payload))
    }

    /// Select `uid` in column `depth`.
    pub fn select(&self, depth: usize, uid: impl Into<Uid>) -> SelectionEffect {
        let mut state = self.state.lock();
        update(
            &mut state.selection,
            SelectionMsg::Select {
                depth,
                uid: uid.into(),
            },
        )
    }

    /// Return to the root and auto-descend.
    pub fn clear_selection(&self) -> SelectionEffect {
        let mut state = self.state.lock();
        update(&mut state.selection, SelectionMsg::Clear)
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock();
        SessionSnapshot {
            generation: state.applied,
            tree: state.tree.clone(),
            path: state.selection.path().clone(),
        }
    }

    /// Comparison rows for `assertion`, sorted by `mode` or the configured
    /// default. Assertions without a comparison payload have no rows.
    #[must_use]
    pub fn comparison_rows(
        &self,
        assertion: &AssertionEntry,
        mode: Option<SortMode>,
    ) -> Vec<FlattenedRow> {
        let Some(tree) = assertion.comparison() else {
            return Vec::new();
        };
        sort(
            &flatten(tree),
            mode.unwrap_or(self.config.comparison.default_sort),
        )
    }

    /// Flush buffered log output, moving a degraded log back to its
    /// primary path first when that path is writable again.
    pub fn flush_log(&self) {
        if let Some(writer) = self.log.lock().as_mut() {
            if writer.sink().is_degraded() {
                writer.recover();
            }
            writer.flush();
        }
    }

    /// Current activity log sink, or `None` when logging is off.
    #[must_use]
    pub fn log_sink(&self) -> Option<LogSink> {
        self.log.lock().as_ref().map(JsonlWriter::sink)
    }

    fn check_stale(&self, ticket: &LoadTicket) -> Option<LoadOutcome> {
        let current = self.state.lock().applied;
        (ticket.generation <= current).then(|| self.discard(ticket, current))
    }

    fn discard(&self, ticket: &LoadTicket, current: u64) -> LoadOutcome {
        let mut entry = LogEntry::new(EventType::StaleLoadDiscarded, Severity::Info);
        entry.generation = Some(ticket.generation);
        entry.details = Some(format!("generation {current} already applied"));
        self.log(&entry);
        LoadOutcome::Stale {
            generation: ticket.generation,
            current,
        }
    }

    fn log_applied(
        &self,
        applied: &AppliedLoad,
        tree: &ReportNode,
        root_hash: Option<String>,
        path: &SelectionPath,
    ) {
        let AppliedLoad {
            generation,
            diagnostics,
            selection,
            diff,
        } = applied;
        let selection_uids: Vec<String> = path.uids().iter().map(ToString::to_string).collect();

        let mut entry = LogEntry::new(EventType::ReportLoaded, Severity::Info);
        entry.generation = Some(*generation);
        entry.uid = Some(tree.uid.to_string());
        entry.passed = Some(tree.counter.passed);
        entry.failed = Some(tree.counter.failed);
        entry.changed = Some(diff.changed.len() + diff.added.len() + diff.removed.len());
        entry.root_hash = root_hash;
        entry.selection = Some(selection_uids.clone());
        self.log(&entry);

        for violation in diagnostics {
            let mut entry = LogEntry::new(EventType::IntegrityViolation, Severity::Warning);
            entry.generation = Some(*generation);
            entry.uid = Some(violation.uid().to_string());
            entry.diagnostic = Some(violation.label().to_owned());
            self.log(&entry);
        }

        if let SelectionEffect::Truncated { dropped } = selection {
            let mut entry = LogEntry::new(EventType::SelectionTruncated, Severity::Warning);
            entry.generation = Some(*generation);
            entry.selection = Some(selection_uids);
            entry.details = Some(format!(
                "dropped {}",
                SelectionPath::from(dropped.clone())
            ));
            self.log(&entry);
        }
    }

    fn log(&self, entry: &LogEntry) {
        if let Some(writer) = self.log.lock().as_mut() {
            writer.write_entry(entry);
        }
    }
}

impl std::fmt::Debug for ReportSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ReportSession")
            .field("issued", &state.issued)
            .field("applied", &state.applied)
            .field("path", state.selection.path())
            .finish_non_exhaustive()
    }
}
