use crate::config::Config;
use anyhow::{Context, Result};
use blake3::Hasher;
use ignore::WalkBuilder;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const STORE_DIR: &str = ".authgraph";

#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub rel_path: String,
    pub abs_path: PathBuf,
    pub hash: String,
    pub size: i64,
    pub modified: i64,
    pub language: String,
}

#[derive(Debug, Clone)]
pub struct LanguageSpec {
    pub name: &'static str,
    pub extensions: &'static [&'static str],
}

#[derive(Debug, Clone, Copy)]
pub struct ScanOptions {
    pub no_ignore: bool,
    pub max_file_bytes: u64,
}

impl ScanOptions {
    pub fn new(no_ignore: bool) -> Self {
        Self {
            no_ignore,
            ..Self::default()
        }
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            no_ignore: false,
            max_file_bytes: Config::get().max_file_bytes,
        }
    }
}

static LANGUAGE_SPECS: &[LanguageSpec] = &[
    LanguageSpec {
        name: "javascript",
        extensions: &["js", "jsx", "mjs", "cjs"],
    },
    LanguageSpec {
        name: "typescript",
        extensions: &["ts", "mts", "cts"],
    },
    LanguageSpec {
        name: "tsx",
        extensions: &["tsx"],
    },
];

pub fn scan_repo(repo_root: &Path) -> Result<Vec<ScannedFile>> {
    scan_repo_with_options(repo_root, ScanOptions::default())
}

pub fn scan_repo_with_options(repo_root: &Path, options: ScanOptions) -> Result<Vec<ScannedFile>> {
    let mut files = Vec::new();
    let mut builder = WalkBuilder::new(repo_root);
    if options.no_ignore {
        builder
            .ignore(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .parents(false);
    } else {
        builder
            .ignore(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .parents(true)
            .require_git(false);
    }
    let walker = builder
        .hidden(false)
        .filter_entry(|entry| !is_ignored_entry(entry))
        .build();

    for entry in walker {
        let entry = match entry {
            Ok(value) => value,
            Err(err) => {
                warn!("walk error: {err}");
                continue;
            }
        };
        if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }
        let path = entry.path();
        let language = match detect_language(path) {
            Some(value) => value,
            None => continue,
        };
        let rel_path = crate::util::normalize_rel_path(repo_root, path)?;
        let metadata = match fs::metadata(path) {
            Ok(value) => value,
            Err(err) => {
                warn!(path = %rel_path, "stat error: {err}");
                continue;
            }
        };
        if metadata.len() > options.max_file_bytes {
            warn!(
                path = %rel_path,
                size = metadata.len(),
                limit = options.max_file_bytes,
                "skipping oversized file"
            );
            continue;
        }
        let modified = metadata
            .modified()
            .ok()
            .and_then(|m| m.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        let size = metadata.len() as i64;
        let hash = match hash_file(path).with_context(|| format!("hash {}", path.display())) {
            Ok(value) => value,
            Err(err) => {
                warn!(path = %rel_path, "{err:#}");
                continue;
            }
        };
        files.push(ScannedFile {
            rel_path,
            abs_path: path.to_path_buf(),
            hash,
            size,
            modified,
            language: language.to_string(),
        });
    }
    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(files)
}

fn is_ignored_entry(entry: &ignore::DirEntry) -> bool {
    match entry.file_name() {
        name if name == OsStr::new(STORE_DIR) => true,
        name if name == OsStr::new(".git") => true,
        name if name == OsStr::new("node_modules") => true,
        _ => false,
    }
}

fn detect_language(path: &Path) -> Option<&'static str> {
    let ext = path.extension().and_then(|ext| ext.to_str())?;
    for spec in LANGUAGE_SPECS {
        if spec.extensions.iter().any(|candidate| *candidate == ext) {
            return Some(spec.name);
        }
    }
    None
}

pub fn language_for_path(path: &Path) -> Option<&'static str> {
    detect_language(path)
}

pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize().to_hex().to_string()
}

fn hash_file(path: &Path) -> Result<String> {
    let data = fs::read(path)?;
    Ok(hash_bytes(&data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_script_languages() {
        assert_eq!(language_for_path(Path::new("a/b.js")), Some("javascript"));
        assert_eq!(language_for_path(Path::new("a/b.cjs")), Some("javascript"));
        assert_eq!(language_for_path(Path::new("b.mts")), Some("typescript"));
        assert_eq!(language_for_path(Path::new("b.tsx")), Some("tsx"));
        assert_eq!(language_for_path(Path::new("b.py")), None);
        assert_eq!(language_for_path(Path::new("Makefile")), None);
    }

    #[test]
    fn hashes_are_stable_hex() {
        let a = hash_bytes(b"app.get('/a')");
        assert_eq!(a, hash_bytes(b"app.get('/a')"));
        assert_ne!(a, hash_bytes(b"app.get('/b')"));
        assert_eq!(a.len(), 64);
    }
}
