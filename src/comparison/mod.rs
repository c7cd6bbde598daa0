//! Structural comparison payloads: decode, flatten into rows, and reorder.

pub mod flatten;
pub mod node;
pub mod sort;

#[cfg(test)]
mod test_properties;

pub use flatten::{FlattenedRow, RowStatus, SourceRef, decode_rows, flatten};
pub use node::{ComparisonNode, MatchState};
pub use sort::{SortMode, sort};
