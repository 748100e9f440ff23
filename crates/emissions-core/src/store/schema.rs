//! SQLite schema DDL and migration framework.

use rusqlite::Connection;

use crate::errors::EmissionsResult;

/// Current schema version. Migrations run from whatever the DB currently
/// reports up to this value.
pub const SCHEMA_VERSION: i32 = 2;

/// Core DDL statements: 6 CREATE TABLE + 3 CREATE INDEX.
///
/// Executed with `CREATE … IF NOT EXISTS` so they are safe to replay on an
/// already-initialised database.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    // ── tables (6) ──────────────────────────────────────────────────────
    "CREATE TABLE IF NOT EXISTS schema_meta (
        key TEXT PRIMARY KEY,
        value TEXT
    );",
    "CREATE TABLE IF NOT EXISTS migration_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        from_version INTEGER NOT NULL,
        to_version INTEGER NOT NULL,
        status TEXT NOT NULL,
        error_message TEXT,
        created_at TEXT DEFAULT CURRENT_TIMESTAMP
    );",
    // No UNIQUE(name, category): duplicates must stay observable so that
    // lookups can report them as ambiguous.
    "CREATE TABLE IF NOT EXISTS emission_factors (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        category TEXT NOT NULL,
        emission_factor REAL NOT NULL,
        unit TEXT NOT NULL,
        source TEXT,
        created_at TEXT DEFAULT CURRENT_TIMESTAMP,
        updated_at TEXT DEFAULT CURRENT_TIMESTAMP
    );",
    "CREATE TABLE IF NOT EXISTS components (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        component_type TEXT NOT NULL,
        metadata_json TEXT NOT NULL DEFAULT '{}',
        created_at TEXT DEFAULT CURRENT_TIMESTAMP
    );",
    "CREATE TABLE IF NOT EXISTS buildings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        location TEXT,
        created_at TEXT DEFAULT CURRENT_TIMESTAMP
    );",
    "CREATE TABLE IF NOT EXISTS components_by_building (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        building_id INTEGER NOT NULL REFERENCES buildings(id) ON DELETE CASCADE,
        component_id INTEGER NOT NULL REFERENCES components(id) ON DELETE CASCADE,
        quantity REAL NOT NULL DEFAULT 1.0,
        UNIQUE(building_id, component_id)
    );",
    // ── indexes (3) ─────────────────────────────────────────────────────
    "CREATE INDEX IF NOT EXISTS idx_factors_category ON emission_factors(category);",
    "CREATE INDEX IF NOT EXISTS idx_components_type ON components(component_type);",
    "CREATE INDEX IF NOT EXISTS idx_buildings_name ON buildings(name);",
];

// ─── Migration framework ────────────────────────────────────────────────────

/// Run all pending migrations from the current stored version up to
/// [`SCHEMA_VERSION`].  Each step is wrapped in a SAVEPOINT so a failure
/// rolls back only that single step.
pub fn migrate_schema(conn: &Connection) -> EmissionsResult<()> {
    let mut current_version = get_schema_version(conn);

    while current_version < SCHEMA_VERSION {
        let next_version = current_version + 1;
        conn.execute_batch("SAVEPOINT emissions_migrate_step;")?;

        let step_result = (|| -> EmissionsResult<()> {
            match next_version {
                1 => migrate_to_v1(conn)?,
                2 => migrate_to_v2(conn)?,
                _ => {} // future versions: no-op until migration is defined
            }
            set_schema_version(conn, next_version)?;
            record_migration_step(conn, current_version, next_version, "success", None)?;
            conn.execute_batch("RELEASE SAVEPOINT emissions_migrate_step;")?;
            Ok(())
        })();

        match step_result {
            Ok(()) => {
                current_version = next_version;
            }
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK TO SAVEPOINT emissions_migrate_step;");
                let _ = conn.execute_batch("RELEASE SAVEPOINT emissions_migrate_step;");
                let _ = record_migration_step(
                    conn,
                    current_version,
                    next_version,
                    "failed",
                    Some(&e.to_string()),
                );
                return Err(e);
            }
        }
    }

    Ok(())
}

/// Read the current schema version from `schema_meta`.
/// Returns 0 when the key is absent or unparseable.
pub fn get_schema_version(conn: &Connection) -> i32 {
    let result: Result<String, _> = conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'schema_version';",
        [],
        |row| row.get(0),
    );
    match result {
        Ok(v) => v.parse::<i32>().unwrap_or(0),
        Err(_) => 0,
    }
}

fn set_schema_version(conn: &Connection, version: i32) -> EmissionsResult<()> {
    conn.execute(
        "INSERT INTO schema_meta(key, value) \
         VALUES('schema_version', ?1) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value;",
        rusqlite::params![version.to_string()],
    )?;
    Ok(())
}

fn record_migration_step(
    conn: &Connection,
    from_v: i32,
    to_v: i32,
    status: &str,
    error_msg: Option<&str>,
) -> EmissionsResult<()> {
    conn.execute(
        "INSERT INTO migration_history(from_version, to_version, status, error_message) \
         VALUES (?1, ?2, ?3, ?4);",
        rusqlite::params![from_v, to_v, status, error_msg],
    )?;
    Ok(())
}

// ─── Individual migration steps ─────────────────────────────────────────────

/// v0 -> v1: baseline, no-op.
fn migrate_to_v1(_conn: &Connection) -> EmissionsResult<()> {
    Ok(())
}

/// v1 -> v2: index the `(name, category)` factor lookup key.
fn migrate_to_v2(conn: &Connection) -> EmissionsResult<()> {
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_factors_name_category \
         ON emission_factors(name, category);",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        for stmt in SCHEMA_STATEMENTS {
            conn.execute_batch(stmt).unwrap();
        }
        conn
    }

    #[test]
    fn schema_statement_counts() {
        // 6 tables + 3 indexes
        assert_eq!(SCHEMA_STATEMENTS.len(), 9);
    }

    #[test]
    fn migrate_fresh_database() {
        let conn = fresh();
        migrate_schema(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), SCHEMA_VERSION);

        let history: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM migration_history WHERE status = 'success';",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(history, SCHEMA_VERSION as i64);
    }

    #[test]
    fn migrate_idempotent() {
        let conn = fresh();
        migrate_schema(&conn).unwrap();
        migrate_schema(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), SCHEMA_VERSION);
    }

    #[test]
    fn lookup_index_exists_after_migration() {
        let conn = fresh();
        migrate_schema(&conn).unwrap();
        let found: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master \
                 WHERE type = 'index' AND name = 'idx_factors_name_category';",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(found, 1);
    }
}
