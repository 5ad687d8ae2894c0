//! Plumbing commands: direct access to objects, revisions and the commit
//! graph
//!
//! - `cat_file`: print an object
//! - `hash_object`: hash (and optionally store) a workspace file
//! - `ls_tree`: list a tree's entries
//! - `rev_parse`: resolve revision expressions
//! - `graph`: merge bases, ahead/behind counts and descendancy
//! - `write_commit`: store the index as a tree and commit it

pub mod cat_file;
pub mod graph;
pub mod hash_object;
pub mod ls_tree;
pub mod rev_parse;
pub mod write_commit;
