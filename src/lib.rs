//! Cellar runs parameterized SQL through pluggable drivers and turns the
//! resulting cursors into rows: maps, arrays or anything a [`Strategy`]
//! builds. Rows can be read lazily while iterating a [`plan`], followed to
//! related rows through a [`Navigation`], written in chunked batches and
//! grouped in transactions.
//!
//! Drivers live in their own crates, like `cellar-sqlite`.
pub use cellar_core::*;
