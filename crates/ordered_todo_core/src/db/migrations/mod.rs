//! SQLite migration registry and executor.
//!
//! # Responsibility
//! - Register named schema migrations in a fixed order.
//! - Apply each pending migration atomically together with its history row.
//!
//! # Invariants
//! - Shipped migration names are never renamed or reordered; the history
//!   table identifies applied steps by name only.
//! - A failed step leaves no schema change and no history row behind.

use crate::db::{DbError, DbResult};
use log::{error, info};
use rusqlite::{Connection, Transaction};
use std::collections::HashSet;
use std::time::Instant;

/// Schema mutation run inside the step's own transaction.
pub type MigrationFn = fn(&Transaction<'_>) -> rusqlite::Result<()>;

const HISTORY_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS migration_history (
    name TEXT PRIMARY KEY NOT NULL,
    applied_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now') * 1000)
);";

/// One named schema-change step.
#[derive(Clone, Copy)]
pub struct Migration {
    name: &'static str,
    apply: MigrationFn,
}

impl std::fmt::Debug for Migration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migration").field("name", &self.name).finish()
    }
}

impl Migration {
    pub const fn new(name: &'static str, apply: MigrationFn) -> Self {
        Self { name, apply }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

const MIGRATIONS: &[Migration] = &[Migration::new("create_list_model", create_list_model)];

fn create_list_model(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    tx.execute_batch(include_str!("0001_create_list_model.sql"))
}

/// Ordered migration sequence.
#[derive(Debug, Clone, Default)]
pub struct Migrator {
    migrations: Vec<Migration>,
}

impl Migrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one step after every step registered so far.
    ///
    /// # Errors
    /// - `DbError::InvalidMigration` for an empty or already registered name.
    pub fn register(&mut self, name: &'static str, apply: MigrationFn) -> DbResult<&mut Self> {
        if name.trim().is_empty() {
            return Err(DbError::InvalidMigration(
                "migration name cannot be empty".to_string(),
            ));
        }
        if self.migrations.iter().any(|migration| migration.name == name) {
            return Err(DbError::InvalidMigration(format!(
                "migration `{name}` is already registered"
            )));
        }
        self.migrations.push(Migration::new(name, apply));
        Ok(self)
    }

    /// Returns registered names in application order.
    pub fn names(&self) -> Vec<&'static str> {
        self.migrations.iter().map(Migration::name).collect()
    }

    pub fn latest_name(&self) -> Option<&'static str> {
        self.migrations.last().map(Migration::name)
    }

    /// Returns registered names not yet recorded in `conn`'s history.
    pub fn pending(&self, conn: &Connection) -> DbResult<Vec<&'static str>> {
        let applied = applied_migrations(conn)?;
        Ok(self
            .migrations
            .iter()
            .map(Migration::name)
            .filter(|name| !applied.iter().any(|done| done == name))
            .collect())
    }

    /// Applies every pending step and returns the names applied by this call.
    ///
    /// Running against an already migrated database applies nothing.
    ///
    /// # Errors
    /// - `DbError::UnknownAppliedMigration` when history names a step this
    ///   registry does not contain; the schema is left untouched.
    /// - `DbError::Migration` when a step fails; earlier steps stay applied.
    pub fn migrate(&self, conn: &mut Connection) -> DbResult<Vec<&'static str>> {
        let started_at = Instant::now();
        info!(
            "event=db_migrate module=db status=start registered={}",
            self.migrations.len()
        );

        match self.migrate_inner(conn) {
            Ok(applied) => {
                info!(
                    "event=db_migrate module=db status=ok applied={} duration_ms={}",
                    applied.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(applied)
            }
            Err(err) => {
                error!(
                    "event=db_migrate module=db status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    fn migrate_inner(&self, conn: &mut Connection) -> DbResult<Vec<&'static str>> {
        self.check_names()?;
        conn.execute_batch(HISTORY_TABLE_SQL)?;

        let applied = applied_migrations(conn)?;
        if let Some(unknown) = applied
            .iter()
            .find(|name| !self.migrations.iter().any(|m| m.name == name.as_str()))
        {
            return Err(DbError::UnknownAppliedMigration(unknown.clone()));
        }

        let mut newly_applied = Vec::new();
        for migration in &self.migrations {
            if applied.iter().any(|name| name == migration.name) {
                continue;
            }

            let tx = conn.transaction()?;
            (migration.apply)(&tx).map_err(|source| DbError::Migration {
                name: migration.name.to_string(),
                source,
            })?;
            tx.execute(
                "INSERT INTO migration_history (name) VALUES (?1);",
                [migration.name],
            )?;
            tx.commit()?;

            info!(
                "event=db_migrate_step module=db status=ok name={}",
                migration.name
            );
            newly_applied.push(migration.name);
        }

        Ok(newly_applied)
    }

    fn check_names(&self) -> DbResult<()> {
        let mut seen = HashSet::new();
        for migration in &self.migrations {
            if !seen.insert(migration.name) {
                return Err(DbError::InvalidMigration(format!(
                    "migration `{}` is registered twice",
                    migration.name
                )));
            }
        }
        Ok(())
    }
}

/// Returns the migration sequence shipped with this build.
pub fn build_migrations() -> Migrator {
    Migrator {
        migrations: MIGRATIONS.to_vec(),
    }
}

/// Returns the newest migration name known by this binary.
pub fn latest_migration_name() -> &'static str {
    MIGRATIONS.last().map_or("", |migration| migration.name)
}

/// Applies all pending shipped migrations on the provided connection.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<Vec<&'static str>> {
    build_migrations().migrate(conn)
}

/// Returns applied migration names in the order they were applied.
///
/// A database that was never migrated has no history and returns an empty list.
pub fn applied_migrations(conn: &Connection) -> DbResult<Vec<String>> {
    let has_history: bool = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'migration_history'
        );",
        [],
        |row| row.get(0),
    )?;
    if !has_history {
        return Ok(Vec::new());
    }

    let mut stmt = conn.prepare("SELECT name FROM migration_history ORDER BY rowid ASC;")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::{build_migrations, latest_migration_name, Migrator, MIGRATIONS};
    use crate::db::DbError;
    use std::collections::HashSet;

    #[test]
    fn shipped_names_are_unique_and_non_empty() {
        let mut seen = HashSet::new();
        for migration in MIGRATIONS {
            assert!(!migration.name().trim().is_empty());
            assert!(seen.insert(migration.name()), "{}", migration.name());
        }
    }

    #[test]
    fn latest_name_matches_registry_tail() {
        assert_eq!(build_migrations().latest_name(), Some(latest_migration_name()));
        assert_eq!(latest_migration_name(), "create_list_model");
    }

    #[test]
    fn register_rejects_duplicate_and_empty_names() {
        let mut migrator = Migrator::new();
        migrator
            .register("first", |tx| tx.execute_batch("CREATE TABLE a (x INTEGER);"))
            .unwrap();

        let duplicate = migrator
            .register("first", |tx| tx.execute_batch("CREATE TABLE b (x INTEGER);"))
            .unwrap_err();
        assert!(matches!(duplicate, DbError::InvalidMigration(_)));

        let empty = migrator
            .register("  ", |tx| tx.execute_batch("SELECT 1;"))
            .unwrap_err();
        assert!(matches!(empty, DbError::InvalidMigration(_)));

        assert_eq!(migrator.names(), vec!["first"]);
    }
}
