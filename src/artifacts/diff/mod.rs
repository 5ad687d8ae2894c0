//! Diffing trees and file contents
//!
//! - `myers`: Myers' shortest edit script over any comparable sequence
//! - `hunk`: line diffs grouped into hunks with context
//! - `tree_diff`: two-pointer comparison of trees into deltas
//! - `delta`: per-path change records and the `Diff` collection
//! - `rename`: pluggable similarity scoring to pair deletions and additions
//! - `patch`, `stat`: unified patch text and `--stat` summaries
//! - `options`: diff configuration and output targets

pub mod delta;
pub mod hunk;
pub mod myers;
pub mod options;
pub mod patch;
pub mod rename;
pub mod stat;
pub mod tree_diff;
