//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the list data access contract.
//! - Isolate SQLite query details from the store and its observers.
//!
//! # Invariants
//! - Every implementation assigns ids on insert and reads in insertion order.

pub mod list_repo;
pub mod memory_repo;
