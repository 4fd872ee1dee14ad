//! PDF error recovery
//!
//! Tools for documents whose cross-reference data cannot be trusted. Both
//! passes scan the file line by line for `num gen obj` headers:
//!
//! - [`rebuild_xref`] throws the table away and reconstructs it, taking the
//!   last `trailer` dictionary that names a `/Root`.
//! - [`fix_xref_offsets`] keeps the table and only corrects offsets of entries
//!   whose object header is found elsewhere.

pub mod rebuild;

pub use rebuild::{fix_xref_offsets, rebuild_xref, RecoveryStats};
