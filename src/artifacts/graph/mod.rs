//! Commit graph traversal
//!
//! `walker` answers reachability questions over parent edges: merge bases,
//! ahead/behind counts, descendancy and time-ordered history.

pub mod walker;
