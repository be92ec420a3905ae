//! Domain model for to-do lists.
//!
//! # Invariants
//! - A list gets its `ListId` from storage on first insert and keeps it.
//! - Lists are immutable once stored; there is no update or delete path.

pub mod list;
