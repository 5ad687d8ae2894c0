//! Database entry types
//!
//! Database entries represent references to objects with their mode information,
//! as found in trees and in the flattened views built from them.

pub mod database_entry;
