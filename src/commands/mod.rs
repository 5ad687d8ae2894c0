//! Repository operations
//!
//! Every command is an `impl Repository` block returning typed values;
//! rendering them is left to the binary.
//!
//! - `plumbing`: object-level building blocks (hash-object, cat-file,
//!   ls-tree, rev-parse, graph queries, tree and commit writing)
//! - `porcelain`: user-facing workflows (init, add, commit, branch, log,
//!   diff, merge)

pub mod plumbing;
pub mod porcelain;
