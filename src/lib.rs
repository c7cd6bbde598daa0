#![forbid(unsafe_code)]
#![recursion_limit = "256"]

//! Report tree engine: turns raw hierarchical test reports into navigable,
//! aggregated trees.
//!
//! Four parts:
//! 1. **Propagation**: counters, statuses, tag indexes and runtime state
//!    aggregated bottom-up ([`report::propagate`])
//! 2. **Split-report merging**: separately shipped assertions spliced back
//!    into the structure tree ([`report::merge`])
//! 3. **Comparison rows**: structural expected/actual trees flattened and
//!    sorted for display ([`comparison`])
//! 4. **Selection**: uid-path navigation that survives reloads
//!    ([`selection`], [`session`])
//!
//! # Library usage
//!
//! ```rust,no_run
//! use report_tree::prelude::*;
//!
//! let session = ReportSession::new(Config::default());
//! let outcome = session.load_file(std::path::Path::new("report.json"));
//! ```

pub mod prelude;

pub mod comparison;
pub mod core;
pub mod logger;
pub mod report;
pub mod selection;
pub mod session;
