//! graft: tree diff and three-way merge over a content-addressed object store
//!
//! The crate is organised the same way a small git implementation is:
//!
//! - `areas`: stateful collaborators (object stores, refs, index, workspace,
//!   repository facade)
//! - `artifacts`: value types and algorithms (objects, diff, graph walking,
//!   merging, revisions)
//! - `commands`: repository operations built from the two layers above
//! - `errors`: the error taxonomy shared by everything

pub mod areas;
pub mod artifacts;
pub mod commands;
pub mod errors;

pub use errors::{Error, Result};
