use crate::config::Config;
use crate::indexer::http::HttpMethod;
use crate::indexer::scan::ScannedFile;
use crate::model::{Overview, PermissionRecord, RoleSummary};
use anyhow::{Context, Result, anyhow};
use blake3::Hasher;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::{Type, Value};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use serde_json::json;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

mod migrations;

#[derive(Debug)]
struct ConnectionCustomizer;

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for ConnectionCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> Result<(), rusqlite::Error> {
        conn.busy_timeout(Duration::from_secs(30))?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        Ok(())
    }

    fn on_release(&self, _conn: Connection) {}
}

#[derive(Debug, Clone)]
pub struct FileRecord {
    pub id: i64,
    pub path: String,
    pub hash: String,
    pub language: String,
}

/// Filters for [`Db::query_permissions`]. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct PermissionQuery {
    pub role: Option<String>,
    pub method: Option<HttpMethod>,
    pub path_prefix: Option<String>,
    pub file: Option<String>,
    pub public_only: bool,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDigest {
    pub rows: usize,
    pub hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbDigest {
    pub files: TableDigest,
    pub permissions: TableDigest,
}

pub struct Db {
    write_conn: Arc<Mutex<Connection>>,
    read_pool: Pool<SqliteConnectionManager>,
}

impl Db {
    pub fn new(db_path: &Path) -> Result<Self> {
        crate::util::ensure_parent_dir(db_path)?;

        let config = Config::get();
        debug!(
            pool_size = config.pool_size,
            min_idle = config.pool_min_idle,
            "initializing connection pool"
        );

        // Migrations run on the write connection before any reader exists
        let write_conn = Connection::open(db_path)
            .with_context(|| format!("open sqlite db at {}", db_path.display()))?;
        write_conn.busy_timeout(Duration::from_secs(30))?;
        write_conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            ",
        )?;
        migrations::migrate(&write_conn)?;
        let write_conn = Arc::new(Mutex::new(write_conn));

        let manager = SqliteConnectionManager::file(db_path);
        let read_pool = Pool::builder()
            .max_size(config.pool_size)
            .min_idle(Some(config.pool_min_idle.min(config.pool_size)))
            .connection_timeout(Duration::from_secs(30))
            .connection_customizer(Box::new(ConnectionCustomizer))
            .build(manager)
            .with_context(|| "create connection pool")?;

        Ok(Self {
            write_conn,
            read_pool,
        })
    }

    pub fn read_conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.read_pool
            .get()
            .with_context(|| "get read connection from pool")
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.write_conn
            .lock()
            .map_err(|_| anyhow!("sqlite write connection lock poisoned"))
    }

    pub fn list_files(&self) -> Result<Vec<FileRecord>> {
        let conn = self.read_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, path, hash, language
             FROM files
             ORDER BY path",
        )?;
        let rows = stmt.query_map([], file_from_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    pub fn get_file_by_path(&self, path: &str) -> Result<Option<FileRecord>> {
        self.read_conn()?
            .query_row(
                "SELECT id, path, hash, language FROM files WHERE path = ?",
                params![path],
                file_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Upserts `file` and replaces its permission rows in one transaction.
    pub fn store_file(&self, file: &ScannedFile, records: &[PermissionRecord]) -> Result<i64> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO files (path, hash, language, size, modified)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(path) DO UPDATE SET
                hash = excluded.hash,
                language = excluded.language,
                size = excluded.size,
                modified = excluded.modified",
            params![
                file.rel_path,
                file.hash,
                file.language,
                file.size,
                file.modified
            ],
        )?;
        let file_id: i64 = tx.query_row(
            "SELECT id FROM files WHERE path = ?",
            params![file.rel_path],
            |row| row.get(0),
        )?;
        tx.execute(
            "DELETE FROM permissions WHERE file_id = ?",
            params![file_id],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO permissions (file_id, seq, line, source, method, path, roles, role)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )?;
            for (seq, record) in records.iter().enumerate() {
                let roles = serde_json::to_string(&record.roles)?;
                stmt.execute(params![
                    file_id,
                    seq as i64,
                    record.line as i64,
                    record.source,
                    record.method.as_str(),
                    record.path,
                    roles,
                    record.role,
                ])?;
            }
        }
        tx.commit()?;
        Ok(file_id)
    }

    pub fn delete_file_by_path(&self, path: &str) -> Result<()> {
        self.conn()?
            .execute("DELETE FROM files WHERE path = ?", params![path])?;
        Ok(())
    }

    pub fn query_permissions(&self, query: &PermissionQuery) -> Result<Vec<PermissionRecord>> {
        let mut sql = String::from(
            "SELECT f.path, p.line, p.source, p.method, p.path, p.roles
             FROM permissions p
             JOIN files f ON p.file_id = f.id
             WHERE 1 = 1",
        );
        let mut values: Vec<Value> = Vec::new();
        if let Some(role) = &query.role {
            sql.push_str(" AND EXISTS (SELECT 1 FROM json_each(p.roles) j WHERE j.value = ?)");
            values.push(Value::Text(role.clone()));
        }
        if let Some(method) = query.method {
            sql.push_str(" AND p.method = ?");
            values.push(Value::Text(method.as_str().to_string()));
        }
        if let Some(prefix) = &query.path_prefix {
            sql.push_str(" AND substr(p.path, 1, ?) = ?");
            values.push(Value::Integer(prefix.chars().count() as i64));
            values.push(Value::Text(prefix.clone()));
        }
        if let Some(file) = &query.file {
            sql.push_str(" AND f.path = ?");
            values.push(Value::Text(file.clone()));
        }
        if query.public_only {
            sql.push_str(" AND p.role IS NULL");
        }
        sql.push_str(" ORDER BY f.path, p.seq");
        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            values.push(Value::Integer(limit as i64));
        }

        let conn = self.read_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), permission_from_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    pub fn all_permissions(&self) -> Result<Vec<PermissionRecord>> {
        self.query_permissions(&PermissionQuery::default())
    }

    pub fn role_summary(&self) -> Result<Vec<RoleSummary>> {
        let conn = self.read_conn()?;
        let mut stmt = conn.prepare(
            "SELECT j.value, COUNT(*), group_concat(DISTINCT p.method)
             FROM permissions p, json_each(p.roles) j
             GROUP BY j.value
             ORDER BY j.value",
        )?;
        let rows = stmt.query_map([], |row| {
            let role: String = row.get(0)?;
            let routes: i64 = row.get(1)?;
            let methods: Option<String> = row.get(2)?;
            let mut methods: Vec<String> = methods
                .unwrap_or_default()
                .split(',')
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .collect();
            methods.sort();
            Ok(RoleSummary {
                role,
                routes,
                methods,
            })
        })?;
        let mut summary = Vec::new();
        for row in rows {
            summary.push(row?);
        }
        Ok(summary)
    }

    pub fn overview(&self, repo_root: &Path) -> Result<Overview> {
        let last_indexed = self.get_meta_i64("last_indexed")?;
        let conn = self.read_conn()?;
        let files: i64 = conn.query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;
        let permissions: i64 =
            conn.query_row("SELECT COUNT(*) FROM permissions", [], |row| row.get(0))?;
        let roles: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT j.value) FROM permissions p, json_each(p.roles) j",
            [],
            |row| row.get(0),
        )?;
        let public_routes: i64 = conn.query_row(
            "SELECT COUNT(*) FROM permissions WHERE role IS NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(Overview {
            repo_root: repo_root.to_string_lossy().to_string(),
            files,
            permissions,
            roles,
            public_routes,
            last_indexed,
        })
    }

    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        self.read_conn()?
            .query_row(
                "SELECT value FROM meta WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO meta (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn get_meta_i64(&self, key: &str) -> Result<Option<i64>> {
        Ok(self.get_meta(key)?.and_then(|v| v.parse::<i64>().ok()))
    }

    pub fn set_meta_i64(&self, key: &str, value: i64) -> Result<()> {
        self.set_meta(key, &value.to_string())
    }

    pub fn digest(&self) -> Result<DbDigest> {
        Ok(DbDigest {
            files: self.digest_files()?,
            permissions: self.digest_permissions()?,
        })
    }

    fn digest_files(&self) -> Result<TableDigest> {
        let conn = self.read_conn()?;
        let mut stmt = conn.prepare(
            "SELECT path, hash, language, size
             FROM files
             ORDER BY path",
        )?;
        let rows = stmt.query_map([], |row| {
            let path: String = row.get(0)?;
            let hash: String = row.get(1)?;
            let language: String = row.get(2)?;
            let size: i64 = row.get(3)?;
            Ok(json!([path, hash, language, size]).to_string())
        })?;
        digest_rows(rows)
    }

    fn digest_permissions(&self) -> Result<TableDigest> {
        let conn = self.read_conn()?;
        let mut stmt = conn.prepare(
            "SELECT f.path, p.seq, p.line, p.source, p.method, p.path, p.roles, p.role
             FROM permissions p
             JOIN files f ON p.file_id = f.id
             ORDER BY f.path, p.seq",
        )?;
        let rows = stmt.query_map([], |row| {
            let file: String = row.get(0)?;
            let seq: i64 = row.get(1)?;
            let line: i64 = row.get(2)?;
            let source: String = row.get(3)?;
            let method: String = row.get(4)?;
            let path: String = row.get(5)?;
            let roles: String = row.get(6)?;
            let role: Option<String> = row.get(7)?;
            Ok(json!([file, seq, line, source, method, path, roles, role]).to_string())
        })?;
        digest_rows(rows)
    }
}

fn file_from_row(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    Ok(FileRecord {
        id: row.get(0)?,
        path: row.get(1)?,
        hash: row.get(2)?,
        language: row.get(3)?,
    })
}

fn permission_from_row(row: &Row<'_>) -> rusqlite::Result<PermissionRecord> {
    let file: String = row.get(0)?;
    let line: i64 = row.get(1)?;
    let source: String = row.get(2)?;
    let method: String = row.get(3)?;
    let path: String = row.get(4)?;
    let roles: String = row.get(5)?;
    let method: HttpMethod = method
        .parse()
        .map_err(|err: anyhow::Error| {
            rusqlite::Error::FromSqlConversionFailure(3, Type::Text, err.into())
        })?;
    let roles: Vec<String> = serde_json::from_str(&roles)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(err)))?;
    Ok(PermissionRecord::new(
        &file,
        line.max(1) as usize,
        &source,
        method,
        path,
        roles,
    ))
}

fn digest_rows<I>(rows: I) -> Result<TableDigest>
where
    I: Iterator<Item = rusqlite::Result<String>>,
{
    let mut hasher = Hasher::new();
    let mut count = 0;
    for row in rows {
        let row = row?;
        hasher.update(row.as_bytes());
        hasher.update(b"\n");
        count += 1;
    }
    Ok(TableDigest {
        rows: count,
        hash: hasher.finalize().to_hex().to_string(),
    })
}
