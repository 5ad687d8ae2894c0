//! Porcelain commands
//!
//! - `init`: create a repository
//! - `add`: stage files
//! - `commit`: record the index as a commit
//! - `branch`: create and list branches and tags
//! - `log`: commit history
//! - `diff`: compare trees, the index and the workspace
//! - `merge`: fast-forward or three-way merge another commit into HEAD

pub mod add;
pub mod branch;
pub mod commit;
pub mod diff;
pub mod init;
pub mod log;
pub mod merge;
