//! Versioned schema migrations
//!
//! Migrations are ordered by revision, idempotent, and applied once at
//! startup before any cache load. A failed migration aborts startup; the
//! engine never runs against an unmigrated schema.

use crate::storage::schema;
use crate::{Error, Result};
use rusqlite::{params, Connection};
use std::collections::HashSet;

/// A single ordered schema-evolution step.
pub trait Migration: Send + Sync {
    /// Revision this step brings the schema to
    fn revision(&self) -> u32;

    /// Apply the schema change. Statements must guard against objects that
    /// already exist so re-running stays safe.
    fn apply(&self, conn: &Connection) -> rusqlite::Result<()>;
}

/// Applies pending migrations in ascending revision order.
///
/// Applied revisions are recorded in `<prefix>migrations`; a step found
/// there is skipped on later runs.
pub struct MigrationRunner {
    prefix: String,
}

impl MigrationRunner {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Bring the store up to the newest revision in `migrations`.
    pub fn run(&self, migrations: &[Box<dyn Migration>], conn: &Connection) -> Result<()> {
        conn.execute(&schema::create_migrations_table(&self.prefix), [])?;

        let applied: HashSet<u32> = {
            let mut stmt =
                conn.prepare(&format!("SELECT revision FROM {}migrations", self.prefix))?;
            let revisions = stmt.query_map([], |row| row.get(0))?;
            revisions.filter_map(|r| r.ok()).collect()
        };

        let mut pending: Vec<&dyn Migration> = migrations
            .iter()
            .map(|m| m.as_ref())
            .filter(|m| !applied.contains(&m.revision()))
            .collect();
        pending.sort_by_key(|m| m.revision());

        for migration in pending {
            migration.apply(conn).map_err(|source| Error::Schema {
                revision: migration.revision(),
                source,
            })?;
            conn.execute(
                &format!(
                    "INSERT OR IGNORE INTO {}migrations (revision) VALUES (?1)",
                    self.prefix
                ),
                params![migration.revision()],
            )?;
            tracing::info!(revision = migration.revision(), "applied schema migration");
        }

        Ok(())
    }
}

/// Revision 1: create the chests and items tables
pub struct CreateTables {
    prefix: String,
}

impl CreateTables {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Migration for CreateTables {
    fn revision(&self) -> u32 {
        1
    }

    fn apply(&self, conn: &Connection) -> rusqlite::Result<()> {
        for stmt in schema::all_schema_statements(&self.prefix) {
            conn.execute(&stmt, [])?;
        }
        Ok(())
    }
}

/// The full ordered migration set for the current schema
pub fn all_migrations(prefix: &str) -> Vec<Box<dyn Migration>> {
    vec![Box::new(CreateTables::new(prefix))]
}
