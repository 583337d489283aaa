use crate::config::Config;
use crate::db::Db;
use crate::model::{
    Analysis, AnalysisStats, ChangedFilesResult, IndexStats, PermissionRecord, SourceUnit,
};
use anyhow::{Result, anyhow};
use scan::ScannedFile;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

pub mod express;
pub mod http;
pub mod scan;

pub use express::{ExtractOptions, ReceiverPolicy, extract_permissions};

const OPTIONS_META_KEY: &str = "extract_options";

/// Extracts permissions from every file under `repo_root` without a store.
///
/// Records come back ordered by file path, then in extraction order. A file
/// that cannot be read is counted in `errors` and does not stop the run.
pub fn analyze(
    repo_root: &Path,
    scan_options: scan::ScanOptions,
    options: &ExtractOptions,
) -> Result<Analysis> {
    let started = Instant::now();
    let scanned = scan::scan_repo_with_options(repo_root, scan_options)?;
    let mut stats = AnalysisStats {
        scanned: scanned.len(),
        ..AnalysisStats::default()
    };
    let mut records = Vec::new();
    for outcome in extract_files(&scanned, options, Config::get().workers) {
        match outcome {
            Ok(file_records) => {
                stats.analyzed += 1;
                records.extend(file_records);
            }
            Err(_) => stats.errors += 1,
        }
    }
    stats.records = records.len();
    stats.duration_ms = started.elapsed().as_millis();
    info!(
        files = stats.analyzed,
        errors = stats.errors,
        records = stats.records,
        "analysis finished"
    );
    Ok(Analysis { stats, records })
}

pub fn extract_file(file: &ScannedFile, options: &ExtractOptions) -> Result<Vec<PermissionRecord>> {
    let text = crate::util::read_to_string(&file.abs_path).inspect_err(|err| {
        warn!(path = %file.rel_path, "{err:#}");
    })?;
    Ok(extract_permissions(
        &SourceUnit::new(&file.rel_path, &text),
        options,
    ))
}

/// Reads and extracts `files` on up to `workers` scoped threads. Results keep
/// the input order.
fn extract_files(
    files: &[ScannedFile],
    options: &ExtractOptions,
    workers: usize,
) -> Vec<Result<Vec<PermissionRecord>>> {
    if files.is_empty() {
        return Vec::new();
    }
    let chunk_size = files.len().div_ceil(workers.max(1));
    std::thread::scope(|scope| {
        let handles: Vec<_> = files
            .chunks(chunk_size)
            .map(|chunk| {
                let handle = scope.spawn(move || {
                    chunk
                        .iter()
                        .map(|file| extract_file(file, options))
                        .collect::<Vec<_>>()
                });
                (chunk.len(), handle)
            })
            .collect();

        let mut outcomes = Vec::with_capacity(files.len());
        for (len, handle) in handles {
            match handle.join() {
                Ok(results) => outcomes.extend(results),
                Err(_) => {
                    warn!(files = len, "extraction worker panicked");
                    outcomes.extend((0..len).map(|_| Err(anyhow!("extraction worker panicked"))));
                }
            }
        }
        outcomes
    })
}

pub struct Indexer {
    repo_root: PathBuf,
    db: Db,
    scan_options: scan::ScanOptions,
    extract_options: ExtractOptions,
}

impl Indexer {
    pub fn new(repo_root: PathBuf, db_path: PathBuf) -> Result<Self> {
        Self::new_with_options(
            repo_root,
            db_path,
            scan::ScanOptions::default(),
            ExtractOptions::default(),
        )
    }

    pub fn new_with_options(
        repo_root: PathBuf,
        db_path: PathBuf,
        scan_options: scan::ScanOptions,
        extract_options: ExtractOptions,
    ) -> Result<Self> {
        let repo_root = std::fs::canonicalize(&repo_root).unwrap_or(repo_root);
        let db = Db::new(&db_path)?;
        Ok(Self {
            repo_root,
            db,
            scan_options,
            extract_options,
        })
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn changed_files(&self) -> Result<ChangedFilesResult> {
        let scanned = scan::scan_repo_with_options(&self.repo_root, self.scan_options)?;
        let existing = self.existing_hashes()?;

        let mut added = Vec::new();
        let mut modified = Vec::new();
        let mut seen = HashSet::new();
        for file in scanned {
            seen.insert(file.rel_path.clone());
            match existing.get(&file.rel_path) {
                None => added.push(file.rel_path),
                Some(hash) if hash != &file.hash => modified.push(file.rel_path),
                _ => {}
            }
        }
        let mut deleted: Vec<String> = existing
            .keys()
            .filter(|path| !seen.contains(*path))
            .cloned()
            .collect();

        added.sort();
        modified.sort();
        deleted.sort();
        Ok(ChangedFilesResult {
            added,
            modified,
            deleted,
        })
    }

    /// Brings the store in line with the repository.
    ///
    /// Unchanged files are skipped unless the extraction options differ from
    /// the ones the store was built with.
    pub fn reindex(&self) -> Result<IndexStats> {
        let started = Instant::now();
        let scanned = scan::scan_repo_with_options(&self.repo_root, self.scan_options)?;
        let fingerprint = options_fingerprint(&self.extract_options);
        let options_changed =
            self.db.get_meta(OPTIONS_META_KEY)?.as_deref() != Some(fingerprint.as_str());
        if options_changed {
            debug!("extraction options changed, re-extracting every file");
        }
        let existing = self.existing_hashes()?;

        let mut stats = IndexStats {
            scanned: scanned.len(),
            ..IndexStats::default()
        };
        let mut seen = HashSet::new();
        let mut pending = Vec::new();
        for file in scanned {
            seen.insert(file.rel_path.clone());
            let unchanged = existing.get(&file.rel_path) == Some(&file.hash);
            if unchanged && !options_changed {
                stats.skipped += 1;
            } else {
                pending.push(file);
            }
        }

        let outcomes = extract_files(&pending, &self.extract_options, Config::get().workers);
        for (file, outcome) in pending.iter().zip(outcomes) {
            match outcome {
                Ok(records) => {
                    self.db.store_file(file, &records)?;
                    stats.indexed += 1;
                    stats.records += records.len();
                }
                Err(_) => {
                    stats.errors += 1;
                    if existing.contains_key(&file.rel_path) {
                        warn!(path = %file.rel_path, "dropping stale permissions for unreadable file");
                        self.db.delete_file_by_path(&file.rel_path)?;
                        stats.deleted += 1;
                    }
                }
            }
        }

        for path in existing.keys().filter(|path| !seen.contains(*path)) {
            self.db.delete_file_by_path(path)?;
            stats.deleted += 1;
        }

        self.db.set_meta(OPTIONS_META_KEY, &fingerprint)?;
        if stats.indexed > 0 || stats.deleted > 0 {
            self.db.set_meta_i64("last_indexed", crate::util::unix_now())?;
        }
        stats.duration_ms = started.elapsed().as_millis();
        info!(
            indexed = stats.indexed,
            skipped = stats.skipped,
            deleted = stats.deleted,
            errors = stats.errors,
            "reindex finished"
        );
        Ok(stats)
    }

    fn existing_hashes(&self) -> Result<HashMap<String, String>> {
        Ok(self
            .db
            .list_files()?
            .into_iter()
            .map(|record| (record.path, record.hash))
            .collect())
    }
}

fn options_fingerprint(options: &ExtractOptions) -> String {
    scan::hash_bytes(format!("{options:?}").as_bytes())
}
