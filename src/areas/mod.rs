//! Stateful repository components
//!
//! - `store`: the object store trait with in-memory and overlay stores
//! - `database`: loose object database on disk
//! - `config`: `.git/config` settings such as the object format
//! - `index`: staging area, including merge conflict stages
//! - `refs`: branches, tags and HEAD
//! - `workspace`: working directory file operations
//! - `working_set`: tree-shaped snapshots of the index and workspace
//! - `repository`: the facade tying the pieces together

pub mod config;
pub mod database;
pub mod index;
pub mod refs;
pub mod repository;
pub mod store;
pub mod working_set;
pub mod workspace;
