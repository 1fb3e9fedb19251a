//! Database schema migrations for tasktally.
//!
//! `migrate` runs on every open. Each step inspects the live schema before
//! changing it, so re-running is a no-op and databases created by any earlier
//! release are upgraded in place. All steps share one transaction.
//! The `schema_version` table records the version that was last applied.

use rusqlite::{Connection, TransactionBehavior};

use super::{format_timestamp, parse_timestamp};
use crate::error::SchemaError;

/// Current schema version.
///
/// Increment this when adding new migration steps.
pub const CURRENT_SCHEMA_VERSION: u32 = 3;

const TASKS_DDL: &str = "
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    name       TEXT NOT NULL,
    points     INTEGER NOT NULL DEFAULT 0,
    notes      TEXT,
    created_at TIMESTAMP NOT NULL,
    deleted    BOOLEAN NOT NULL DEFAULT 0";

const COMPLETIONS_DDL: &str = "
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    task_id      INTEGER NOT NULL,
    completed_at TIMESTAMP NOT NULL,
    points       INTEGER NOT NULL";

fn step<T>(name: &'static str, result: rusqlite::Result<T>) -> Result<T, SchemaError> {
    result.map_err(|source| SchemaError::Rejected { step: name, source })
}

/// Apply all pending migrations and return the resulting schema version.
///
/// # Errors
/// Returns [`SchemaError::Unreachable`] if no transaction can be opened and
/// [`SchemaError::Rejected`] if any step fails; nothing is applied then.
pub fn migrate(conn: &mut Connection) -> Result<u32, SchemaError> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|e| SchemaError::Unreachable(e.to_string()))?;

    step("schema_version", create_schema_version_table(&tx))?;
    let from_version = step("schema_version", get_schema_version(&tx))?;

    step("create_tables", create_base_tables(&tx))?;
    step("rebuild_legacy_tasks", rebuild_legacy_tasks(&tx))?;
    step("import_legacy_completions", import_legacy_completions(&tx))?;
    step(
        "add_deleted_column",
        add_column_if_missing(&tx, "tasks", "deleted", "BOOLEAN NOT NULL DEFAULT 0"),
    )?;
    step("add_notes_column", add_column_if_missing(&tx, "tasks", "notes", "TEXT"))?;
    step("normalize_timestamps", normalize_timestamps(&tx))?;
    step("create_indexes", create_indexes(&tx))?;
    step("set_version", set_schema_version(&tx, CURRENT_SCHEMA_VERSION))?;

    step("commit", tx.commit())?;

    if from_version != CURRENT_SCHEMA_VERSION {
        tracing::info!(
            from = from_version,
            to = CURRENT_SCHEMA_VERSION,
            "database schema migrated"
        );
    }
    Ok(CURRENT_SCHEMA_VERSION)
}

/// Create the schema_version table if it doesn't exist.
fn create_schema_version_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (fresh or pre-tracking database).
pub fn get_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
        row.get::<_, Option<u32>>(0)
    })
    .map(|version| version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: u32) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

fn create_base_tables(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS tasks ({TASKS_DDL});
         CREATE TABLE IF NOT EXISTS completions ({COMPLETIONS_DDL});"
    ))
}

fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get::<_, i64>(0),
    )
    .map(|count| count > 0)
}

fn has_column(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
        [table, column],
        |row| row.get::<_, i64>(0),
    )
    .map(|count| count > 0)
}

fn add_column_if_missing(
    conn: &Connection,
    table: &str,
    column: &str,
    definition: &str,
) -> rusqlite::Result<()> {
    if has_column(conn, table, column)? {
        return Ok(());
    }
    tracing::info!(table, column, "adding missing column");
    conn.execute_batch(&format!("ALTER TABLE {table} ADD COLUMN {column} {definition};"))
}

/// The first release stored `score` (NOT NULL, no default) and `updated_at`
/// on tasks. Inserts that only know `points` would fail there, so the table
/// is rebuilt into the current layout.
fn rebuild_legacy_tasks(conn: &Connection) -> rusqlite::Result<()> {
    if !has_column(conn, "tasks", "score")? {
        return Ok(());
    }

    let points_expr = if has_column(conn, "tasks", "points")? {
        "COALESCE(points, score, 0)"
    } else {
        "COALESCE(score, 0)"
    };
    let notes_expr = if has_column(conn, "tasks", "notes")? {
        "notes"
    } else {
        "NULL"
    };
    let deleted_expr = if has_column(conn, "tasks", "deleted")? {
        "deleted"
    } else {
        "0"
    };

    tracing::info!("rebuilding legacy tasks table");
    conn.execute_batch(&format!(
        "CREATE TABLE tasks_rebuild ({TASKS_DDL});
         INSERT INTO tasks_rebuild (id, name, points, notes, created_at, deleted)
             SELECT id, name, {points_expr}, {notes_expr}, created_at, {deleted_expr} FROM tasks;
         DROP TABLE tasks;
         ALTER TABLE tasks_rebuild RENAME TO tasks;"
    ))
}

/// Older releases logged completions in `task_completions`.
fn import_legacy_completions(conn: &Connection) -> rusqlite::Result<()> {
    if !table_exists(conn, "task_completions")? {
        return Ok(());
    }

    let points_column = if has_column(conn, "task_completions", "points")? {
        "points"
    } else {
        "score"
    };
    let imported = conn.execute(
        &format!(
            "INSERT INTO completions (task_id, completed_at, points)
             SELECT task_id, completed_at, COALESCE({points_column}, 0) FROM task_completions"
        ),
        [],
    )?;
    conn.execute_batch("DROP TABLE task_completions;")?;
    tracing::info!(imported, "imported legacy completion log");
    Ok(())
}

/// Rewrite timestamps stored in older text layouts into the fixed-width
/// RFC 3339 form, so that ordering by the column is chronological.
fn normalize_timestamps(conn: &Connection) -> rusqlite::Result<()> {
    for (table, column) in [("tasks", "created_at"), ("completions", "completed_at")] {
        let mut stmt = conn.prepare(&format!(
            "SELECT id, CAST({column} AS TEXT) FROM {table}
             WHERE {column} NOT GLOB '[0-9][0-9][0-9][0-9]-[0-9][0-9]-[0-9][0-9]T[0-9][0-9]:[0-9][0-9]:[0-9][0-9].[0-9][0-9][0-9][0-9][0-9][0-9]Z'"
        ))?;
        let stale = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut rewritten = 0usize;
        for (id, raw) in stale {
            match parse_timestamp(&raw) {
                Some(ts) => {
                    conn.execute(
                        &format!("UPDATE {table} SET {column} = ?1 WHERE id = ?2"),
                        rusqlite::params![format_timestamp(ts), id],
                    )?;
                    rewritten += 1;
                }
                None => tracing::warn!(table, id, value = %raw, "leaving unparsable timestamp"),
            }
        }
        if rewritten > 0 {
            tracing::info!(table, rewritten, "normalized stored timestamps");
        }
    }
    Ok(())
}

fn create_indexes(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_completions_completed_at ON completions(completed_at);
         CREATE INDEX IF NOT EXISTS idx_completions_task_id ON completions(task_id);
         CREATE INDEX IF NOT EXISTS idx_tasks_deleted ON tasks(deleted);",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(conn: &Connection, table: &str) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")
            .unwrap();
        stmt.query_map([table], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn test_migrate_from_scratch() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(migrate(&mut conn).unwrap(), CURRENT_SCHEMA_VERSION);
        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);

        assert_eq!(
            columns(&conn, "tasks"),
            vec!["id", "name", "points", "notes", "created_at", "deleted"]
        );
        assert_eq!(
            columns(&conn, "completions"),
            vec!["id", "task_id", "completed_at", "points"]
        );
    }

    #[test]
    fn test_schema_version_without_table_is_an_error() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(get_schema_version(&conn).is_err());
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO tasks (name, points, created_at) VALUES ('keep', 4, '2024-01-01T00:00:00.000000Z')",
            [],
        )
        .unwrap();
        migrate(&mut conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM tasks", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }

    /// Schema without soft-delete or notes support.
    #[test]
    fn test_migrate_adds_deleted_and_notes_columns() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                points INTEGER NOT NULL DEFAULT 0,
                created_at DATETIME NOT NULL
            );
            CREATE TABLE completions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                task_id INTEGER NOT NULL,
                completed_at DATETIME NOT NULL,
                points INTEGER NOT NULL,
                FOREIGN KEY(task_id) REFERENCES tasks(id)
            );
            INSERT INTO tasks (name, points, created_at) VALUES ('Old', 7, '2024-01-01 12:00:00+00:00');",
        )
        .unwrap();

        migrate(&mut conn).unwrap();

        let cols = columns(&conn, "tasks");
        assert!(cols.contains(&"deleted".to_string()));
        assert!(cols.contains(&"notes".to_string()));

        let (points, deleted, notes): (i64, bool, Option<String>) = conn
            .query_row(
                "SELECT points, deleted, notes FROM tasks WHERE name = 'Old'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        assert_eq!(points, 7);
        assert!(!deleted);
        assert!(notes.is_none());
    }

    /// First-release schema: `score` columns and a `task_completions` log.
    #[test]
    fn test_migrate_rebuilds_legacy_score_schema() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                score INTEGER NOT NULL,
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL
            );
            CREATE TABLE task_completions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                task_id INTEGER NOT NULL,
                completed_at DATETIME NOT NULL,
                score INTEGER NOT NULL,
                FOREIGN KEY(task_id) REFERENCES tasks(id)
            );
            INSERT INTO tasks (id, name, score, created_at, updated_at)
                VALUES (5, 'Legacy', 9, '2024-01-01 12:00:00+00:00', '2024-01-01 12:00:00+00:00');
            INSERT INTO task_completions (task_id, completed_at, score)
                VALUES (5, '2024-01-02 08:00:00+00:00', 9);",
        )
        .unwrap();

        migrate(&mut conn).unwrap();

        assert_eq!(
            columns(&conn, "tasks"),
            vec!["id", "name", "points", "notes", "created_at", "deleted"]
        );
        let points: i64 = conn
            .query_row("SELECT points FROM tasks WHERE id = 5", [], |row| row.get(0))
            .unwrap();
        assert_eq!(points, 9);

        let (task_id, snapshot): (i64, i64) = conn
            .query_row("SELECT task_id, points FROM completions", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!((task_id, snapshot), (5, 9));

        let completed_at: String = conn
            .query_row("SELECT completed_at FROM completions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(completed_at, "2024-01-02T08:00:00.000000Z");

        assert!(!table_exists(&conn, "task_completions").unwrap());

        // New inserts work against the rebuilt table.
        conn.execute(
            "INSERT INTO tasks (name, created_at) VALUES ('New', '2024-02-01T00:00:00.000000Z')",
            [],
        )
        .unwrap();
    }

    #[test]
    fn test_failed_step_rolls_back_everything() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                score INTEGER NOT NULL,
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL
            );
            CREATE TABLE tasks_rebuild (id INTEGER);",
        )
        .unwrap();

        let err = migrate(&mut conn).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::Rejected { step: "rebuild_legacy_tasks", .. }
        ));

        assert!(!table_exists(&conn, "schema_version").unwrap());
        assert!(!table_exists(&conn, "completions").unwrap());
        assert!(columns(&conn, "tasks").contains(&"score".to_string()));
    }
}
