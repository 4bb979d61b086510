//! Operation log implementation.
//!
//! Every state- or archive-affecting call is recorded once, in order, in
//! an append-only log. An index alongside it answers per-key and per-kind
//! questions without scanning.

mod index;
mod log;

pub use index::OperationIndex;
pub use log::OperationLog;
