//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use report_tree::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{ReportError, Result};

// Report
pub use crate::report::codec::{decode_layout, decode_report, load_report_files};
pub use crate::report::merge::{AssertionsByCase, IntegrityViolation, Merged, merge};
pub use crate::report::model::{
    AssertionEntry, Category, Counter, Entry, ReportNode, Status, Uid,
};
pub use crate::report::propagate::propagate;

// Comparison
pub use crate::comparison::{ComparisonNode, FlattenedRow, SortMode, decode_rows, flatten, sort};

// Selection
pub use crate::selection::{
    SelectionEffect, SelectionModel, SelectionMsg, SelectionPath, auto_descend, columns, resolve,
    select,
};

// Session
pub use crate::session::{LoadOutcome, LoadPayload, ReportSession};
