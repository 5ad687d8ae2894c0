//! Object model
//!
//! All content is stored as immutable objects identified by the hash of
//! their canonical encoding `<kind> <size>\0<body>`:
//!
//! - **Blob**: file content (raw bytes)
//! - **Tree**: directory listing (names, modes and object ids)
//! - **Commit**: snapshot with metadata (tree, parents, signatures, message)
//! - **Tag**: annotated reference to another object

pub mod blob;
pub mod commit;
pub mod file_mode;
pub mod object;
pub mod object_id;
pub mod object_type;
pub mod tag;
pub mod tree;
