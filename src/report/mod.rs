//! Report trees: model, JSON boundary, aggregation, split merging, fingerprints.

pub mod codec;
pub mod fingerprint;
pub mod merge;
pub mod model;
pub mod propagate;

#[cfg(test)]
mod test_properties;

pub use codec::{
    ReportLayout, SplitManifest, SplitParts, assemble_split, decode_layout, decode_report,
    encode_report, load_report_files, split_report, validate_shape,
};
pub use fingerprint::{FingerprintDiff, FingerprintIndex};
pub use merge::{AssertionsByCase, IntegrityViolation, MergeOptions, Merged, merge, merge_with};
pub use model::{
    AssertionEntry, AssertionPayload, Category, Counter, Entry, ReportNode, RuntimeStatus,
    Interval, Status, StatusCategory, TagMap, Timer, Uid,
};
pub use propagate::propagate;
