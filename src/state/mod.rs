//! Current key/value state.
//!
//! The live state is a plain mapping from key to entry. It is mutated in
//! place by writes, deletes and clears, and replaced wholesale on restore.
//! Copies handed to snapshots are built with fallible allocation so an
//! out-of-memory condition aborts the operation instead of the process.

mod operations;
mod table;

pub use operations::{apply_operation, replay};
pub use table::{copy_entries, StateTable};
