use authgraph::db::PermissionQuery;
use authgraph::indexer::http::HttpMethod;
use authgraph::indexer::scan::{self, ScanOptions};
use authgraph::indexer::{self, ExtractOptions, Indexer};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const APP_JS: &str = "\
const express = require('express');
const app = express();
const admin = express.Router();
const users = require('./users');

app.use('/admin', admin);
app.get('/health', (req, res) => res.send('ok'));

admin.route('/settings')
  .get(checkRole('admin'), show)
  .put(checkRole('admin'), checkRole('owner'), update);
";

const USERS_TS: &str = "\
import { Router } from 'express';
const router = Router();

router.get('/users/:id', checkRole('viewer'), async (req, res) => {
  res.json(await load(req.params.id));
});
router.delete('/users/:id', checkRole('admin'), remove);
";

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

fn fixture_repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "src/app.js", APP_JS);
    write(dir.path(), "src/routes/users.ts", USERS_TS);
    write(dir.path(), "README.md", "app.get('/not-code', h)");
    write(dir.path(), "node_modules/dep/index.js", "app.get('/vendored', h);");
    dir
}

fn db_path(repo: &Path) -> PathBuf {
    repo.join(scan::STORE_DIR).join("authgraph.sqlite")
}

fn open_indexer(repo: &Path) -> Indexer {
    Indexer::new(repo.to_path_buf(), db_path(repo)).unwrap()
}

#[test]
fn scan_finds_script_files_only() {
    let repo = fixture_repo();
    let files = scan::scan_repo(repo.path()).unwrap();
    let paths: Vec<_> = files.iter().map(|file| file.rel_path.as_str()).collect();
    assert_eq!(paths, vec!["src/app.js", "src/routes/users.ts"]);
    assert_eq!(files[1].language, "typescript");
}

#[test]
fn analyze_orders_records_by_file() {
    let repo = fixture_repo();
    let analysis = indexer::analyze(
        repo.path(),
        ScanOptions::default(),
        &ExtractOptions::default(),
    )
    .unwrap();
    assert_eq!(analysis.stats.scanned, 2);
    assert_eq!(analysis.stats.analyzed, 2);
    assert_eq!(analysis.stats.errors, 0);
    let summary: Vec<_> = analysis
        .records
        .iter()
        .map(|record| (record.file.as_str(), record.method, record.path.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("src/app.js", HttpMethod::Get, "/admin/settings"),
            ("src/app.js", HttpMethod::Put, "/admin/settings"),
            ("src/app.js", HttpMethod::Get, "/health"),
            ("src/routes/users.ts", HttpMethod::Get, "/users/:id"),
            ("src/routes/users.ts", HttpMethod::Delete, "/users/:id"),
        ]
    );
    assert_eq!(analysis.records[1].roles, vec!["admin", "owner"]);
    assert_eq!(analysis.records[1].line, 9);
}

#[test]
fn unreadable_file_is_counted_not_fatal() {
    let repo = fixture_repo();
    std::fs::write(repo.path().join("src/broken.js"), [0x61, 0xff, 0xfe, 0x28]).unwrap();
    let analysis = indexer::analyze(
        repo.path(),
        ScanOptions::default(),
        &ExtractOptions::default(),
    )
    .unwrap();
    assert_eq!(analysis.stats.scanned, 3);
    assert_eq!(analysis.stats.errors, 1);
    assert_eq!(analysis.records.len(), 5);
}

#[test]
fn oversized_files_are_skipped() {
    let repo = fixture_repo();
    let options = ScanOptions {
        max_file_bytes: 64,
        ..ScanOptions::new(false)
    };
    let files = scan::scan_repo_with_options(repo.path(), options).unwrap();
    assert!(files.is_empty());
}

#[test]
fn reindex_is_incremental() {
    let repo = fixture_repo();
    let indexer = open_indexer(repo.path());

    let first = indexer.reindex().unwrap();
    assert_eq!(first.indexed, 2);
    assert_eq!(first.records, 5);

    let second = indexer.reindex().unwrap();
    assert_eq!(second.indexed, 0);
    assert_eq!(second.skipped, 2);

    write(
        repo.path(),
        "src/routes/users.ts",
        "const router = Router();\nrouter.post('/users', checkRole('admin'), create);\n",
    );
    std::fs::remove_file(repo.path().join("src/app.js")).unwrap();
    write(repo.path(), "src/public.mjs", "app.get('/status', h);\n");

    let changed = indexer.changed_files().unwrap();
    assert_eq!(changed.added, vec!["src/public.mjs"]);
    assert_eq!(changed.modified, vec!["src/routes/users.ts"]);
    assert_eq!(changed.deleted, vec!["src/app.js"]);

    let third = indexer.reindex().unwrap();
    assert_eq!(third.indexed, 2);
    assert_eq!(third.deleted, 1);

    assert!(indexer.db().get_file_by_path("src/app.js").unwrap().is_none());
    let users = indexer.db().get_file_by_path("src/routes/users.ts").unwrap().unwrap();
    assert_eq!(users.language, "typescript");

    let records = indexer.db().all_permissions().unwrap();
    let paths: Vec<_> = records.iter().map(|record| record.path.as_str()).collect();
    assert_eq!(paths, vec!["/status", "/users"]);

    let changed = indexer.changed_files().unwrap();
    assert!(changed.added.is_empty() && changed.modified.is_empty() && changed.deleted.is_empty());
}

#[test]
fn reindex_drops_permissions_of_a_file_that_became_unreadable() {
    let repo = fixture_repo();
    let indexer = open_indexer(repo.path());
    indexer.reindex().unwrap();

    std::fs::write(repo.path().join("src/app.js"), [0x61, 0xff, 0xfe, 0x28]).unwrap();
    let stats = indexer.reindex().unwrap();
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.indexed, 0);
    assert_eq!(stats.deleted, 1);

    assert!(indexer.db().get_file_by_path("src/app.js").unwrap().is_none());
    let records = indexer.db().all_permissions().unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|record| record.file == "src/routes/users.ts"));

    let changed = indexer.changed_files().unwrap();
    assert_eq!(changed.added, vec!["src/app.js"]);
}

#[test]
fn changing_extract_options_reextracts_everything() {
    let repo = fixture_repo();
    open_indexer(repo.path()).reindex().unwrap();

    let options = ExtractOptions {
        role_guards: vec!["hasRole".to_string()],
        ..ExtractOptions::default()
    };
    let indexer = Indexer::new_with_options(
        repo.path().to_path_buf(),
        db_path(repo.path()),
        ScanOptions::default(),
        options,
    )
    .unwrap();
    let stats = indexer.reindex().unwrap();
    assert_eq!(stats.indexed, 2);
    assert_eq!(stats.skipped, 0);
    let overview = indexer.db().overview(indexer.repo_root()).unwrap();
    assert_eq!(overview.roles, 0);
    assert_eq!(overview.public_routes, 5);
}

#[test]
fn query_filters() {
    let repo = fixture_repo();
    let indexer = open_indexer(repo.path());
    indexer.reindex().unwrap();
    let db = indexer.db();

    let admin = db
        .query_permissions(&PermissionQuery {
            role: Some("admin".to_string()),
            ..PermissionQuery::default()
        })
        .unwrap();
    assert_eq!(admin.len(), 3);

    let deletes = db
        .query_permissions(&PermissionQuery {
            method: Some(HttpMethod::Delete),
            ..PermissionQuery::default()
        })
        .unwrap();
    assert_eq!(deletes.len(), 1);
    assert_eq!(deletes[0].file, "src/routes/users.ts");
    assert_eq!(deletes[0].role.as_deref(), Some("admin"));

    let under_admin = db
        .query_permissions(&PermissionQuery {
            path_prefix: Some("/admin".to_string()),
            ..PermissionQuery::default()
        })
        .unwrap();
    assert_eq!(under_admin.len(), 2);

    let public = db
        .query_permissions(&PermissionQuery {
            public_only: true,
            ..PermissionQuery::default()
        })
        .unwrap();
    assert_eq!(public.len(), 1);
    assert_eq!(public[0].path, "/health");

    let limited = db
        .query_permissions(&PermissionQuery {
            file: Some("src/app.js".to_string()),
            limit: Some(1),
            ..PermissionQuery::default()
        })
        .unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].method, HttpMethod::Get);
}

#[test]
fn role_summary_and_overview() {
    let repo = fixture_repo();
    let indexer = open_indexer(repo.path());
    indexer.reindex().unwrap();

    let summary = indexer.db().role_summary().unwrap();
    let roles: Vec<_> = summary
        .iter()
        .map(|entry| (entry.role.as_str(), entry.routes))
        .collect();
    assert_eq!(roles, vec![("admin", 3), ("owner", 1), ("viewer", 1)]);
    assert_eq!(summary[0].methods, vec!["DELETE", "GET", "PUT"]);

    let overview = indexer.db().overview(indexer.repo_root()).unwrap();
    assert_eq!(overview.files, 2);
    assert_eq!(overview.permissions, 5);
    assert_eq!(overview.roles, 3);
    assert_eq!(overview.public_routes, 1);
    assert!(overview.last_indexed.is_some());
}

#[test]
fn stores_are_deterministic() {
    let first = fixture_repo();
    let second = fixture_repo();
    let a = open_indexer(first.path());
    let b = open_indexer(second.path());
    a.reindex().unwrap();
    b.reindex().unwrap();
    let digest_a = a.db().digest().unwrap();
    let digest_b = b.db().digest().unwrap();
    assert_eq!(digest_a.permissions, digest_b.permissions);
    assert_eq!(digest_a.permissions.rows, 5);
}
