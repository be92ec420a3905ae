//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `ordered_todo_core` linkage and that the shipped migrations
//!   apply cleanly to a scratch in-memory database.
//! - Keep output deterministic for quick local sanity checks.

use ordered_todo_core::db::migrations::latest_migration_name;
use ordered_todo_core::{core_version, ping, ListDatabase};
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("ordered_todo_core ping={}", ping());
    println!("ordered_todo_core version={}", core_version());
    println!("ordered_todo_core latest_migration={}", latest_migration_name());

    let store = match ListDatabase::open_in_memory().and_then(ListDatabase::migrate_to_latest) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("ordered_todo_core migrate=error error={err}");
            return ExitCode::FAILURE;
        }
    };
    match store.count() {
        Ok(count) => {
            println!("ordered_todo_core migrate=ok lists={count}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("ordered_todo_core migrate=error error={err}");
            ExitCode::FAILURE
        }
    }
}
