//! Merging divergent histories
//!
//! - `three_way`: line-level merge of one file's three versions
//! - `resolve`: per-path reconciliation of two trees against their base
//! - `merge_result`: outcomes and conflict records
//! - `options`: merge configuration

pub mod merge_result;
pub mod options;
pub mod resolve;
pub mod three_way;
