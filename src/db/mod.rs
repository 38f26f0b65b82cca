pub mod migrations;
pub mod schema;

use std::path::Path;

use rusqlite::Connection;

use crate::error::{MnemoError, Result};

/// Open (or create) the mnemo database at the given path, with schema
/// initialized and migrations applied.
///
/// WAL journal mode lets readers proceed while a writer holds the lock,
/// which the engine relies on for concurrent query/decay traffic.
pub fn open_database(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            MnemoError::StoreFailed(format!(
                "failed to create directory {}: {e}",
                parent.display()
            ))
        })?;
    }

    let conn = Connection::open(path).map_err(|e| {
        MnemoError::StoreFailed(format!("failed to open database at {}: {e}", path.display()))
    })?;

    configure(&conn)?;
    schema::init_schema(&conn)?;
    migrations::run_migrations(&conn)?;

    // Quick integrity check after schema init
    let integrity: String = conn.pragma_query_value(None, "quick_check", |row| row.get(0))?;
    if integrity != "ok" {
        return Err(MnemoError::StoreFailed(format!(
            "database integrity check failed: {integrity}"
        )));
    }

    tracing::info!(path = %path.display(), "database initialized");
    Ok(conn)
}

/// Open an in-memory database with schema and migrations applied.
/// Used by tests and short-lived embedded callers.
pub fn open_memory_database() -> Result<Connection> {
    let conn = Connection::open_in_memory()
        .map_err(|e| MnemoError::StoreFailed(format!("failed to open in-memory database: {e}")))?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    schema::init_schema(&conn)?;
    migrations::run_migrations(&conn)?;
    Ok(conn)
}

fn configure(conn: &Connection) -> Result<()> {
    // WAL for concurrent readers while a writer is active
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    // Wait up to 5 seconds for locks instead of failing immediately
    conn.pragma_update(None, "busy_timeout", "5000")?;
    Ok(())
}

/// Result of a full database health check.
#[derive(Debug)]
pub struct HealthReport {
    pub schema_version: u32,
    pub integrity_ok: bool,
    pub integrity_details: String,
    pub memory_count: i64,
    pub vector_count: i64,
    pub waypoint_count: i64,
    pub embed_log_count: i64,
}

/// Run a comprehensive health check on the database.
pub fn check_database_health(conn: &Connection) -> Result<HealthReport> {
    let schema_version = migrations::get_schema_version(conn)?;

    let integrity_details: String =
        conn.pragma_query_value(None, "integrity_check", |row| row.get(0))?;
    let integrity_ok = integrity_details == "ok";

    let memory_count: i64 = conn
        .query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))
        .unwrap_or(0);
    let vector_count: i64 = conn
        .query_row("SELECT COUNT(*) FROM vectors", [], |row| row.get(0))
        .unwrap_or(0);
    let waypoint_count: i64 = conn
        .query_row("SELECT COUNT(*) FROM waypoints", [], |row| row.get(0))
        .unwrap_or(0);
    let embed_log_count: i64 = conn
        .query_row("SELECT COUNT(*) FROM embed_logs", [], |row| row.get(0))
        .unwrap_or(0);

    Ok(HealthReport {
        schema_version,
        integrity_ok,
        integrity_details,
        memory_count,
        vector_count,
        waypoint_count,
        embed_log_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_check_on_fresh_db() {
        let conn = open_memory_database().unwrap();
        let report = check_database_health(&conn).unwrap();
        assert!(report.integrity_ok);
        assert_eq!(report.schema_version, migrations::CURRENT_SCHEMA_VERSION);
        assert_eq!(report.memory_count, 0);
        assert_eq!(report.waypoint_count, 0);
    }
}
