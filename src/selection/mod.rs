//! Selection state machine: which node is shown, and how that survives reloads.

pub mod model;
pub mod path;
pub mod update;

pub use model::{RejectReason, SelectionEffect, SelectionModel, SelectionMsg, SelectionOptions};
pub use path::{
    Column, Resolution, SelectionPath, auto_descend, auto_descend_bounded, candidates, columns,
    resolve, select,
};
pub use update::update;
