use anyhow::{Result, bail};
use rusqlite::{Connection, OptionalExtension, params};

pub const SCHEMA_VERSION: i64 = 1;

pub fn migrate(conn: &Connection) -> Result<()> {
    let existing = schema_version(conn)?;
    if existing > SCHEMA_VERSION {
        bail!(
            "database schema version {existing} is newer than supported version {SCHEMA_VERSION}"
        );
    }
    conn.execute_batch(
        "
        BEGIN;
        CREATE TABLE IF NOT EXISTS meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS files (
            id INTEGER PRIMARY KEY,
            path TEXT NOT NULL UNIQUE,
            hash TEXT NOT NULL,
            language TEXT NOT NULL,
            size INTEGER NOT NULL,
            modified INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS permissions (
            id INTEGER PRIMARY KEY,
            file_id INTEGER NOT NULL,
            seq INTEGER NOT NULL,
            line INTEGER NOT NULL,
            source TEXT NOT NULL,
            method TEXT NOT NULL,
            path TEXT NOT NULL,
            roles TEXT NOT NULL,
            role TEXT,
            FOREIGN KEY(file_id) REFERENCES files(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_permissions_file ON permissions(file_id, seq);
        CREATE INDEX IF NOT EXISTS idx_permissions_path ON permissions(path);
        CREATE INDEX IF NOT EXISTS idx_permissions_method ON permissions(method);
        CREATE INDEX IF NOT EXISTS idx_permissions_role ON permissions(role);
        COMMIT;
        ",
    )?;
    conn.execute(
        "INSERT INTO meta (key, value) VALUES ('schema_version', ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![SCHEMA_VERSION.to_string()],
    )?;
    Ok(())
}

fn schema_version(conn: &Connection) -> Result<i64> {
    let has_meta: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'meta'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    if has_meta.is_none() {
        return Ok(0);
    }
    let existing: Option<i64> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| {
                row.get::<_, String>(0)
                    .map(|v| v.parse::<i64>().unwrap_or(0))
            },
        )
        .optional()?;
    Ok(existing.unwrap_or(0))
}
