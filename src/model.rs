use crate::indexer::http::HttpMethod;
use serde::{Deserialize, Serialize};

/// One source file handed to the extractor. Borrowed for a single call.
#[derive(Debug, Clone, Copy)]
pub struct SourceUnit<'a> {
    pub name: &'a str,
    pub text: &'a str,
}

impl<'a> SourceUnit<'a> {
    pub fn new(name: &'a str, text: &'a str) -> Self {
        Self { name, text }
    }
}

/// A route registration together with the roles guarding it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRecord {
    pub file: String,
    pub line: usize,
    pub source: String,
    pub method: HttpMethod,
    pub path: String,
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl PermissionRecord {
    pub fn new(
        file: &str,
        line: usize,
        source: &str,
        method: HttpMethod,
        path: String,
        roles: Vec<String>,
    ) -> Self {
        Self {
            file: file.to_string(),
            line,
            source: source.to_string(),
            method,
            path,
            role: roles.first().cloned(),
            roles,
        }
    }

    pub fn is_public(&self) -> bool {
        self.roles.is_empty()
    }
}

#[derive(Debug, Serialize, Default, Clone)]
pub struct AnalysisStats {
    pub scanned: usize,
    pub analyzed: usize,
    pub errors: usize,
    pub records: usize,
    pub duration_ms: u128,
}

#[derive(Debug, Serialize)]
pub struct Analysis {
    pub stats: AnalysisStats,
    pub records: Vec<PermissionRecord>,
}

#[derive(Debug, Serialize, Default)]
pub struct IndexStats {
    pub scanned: usize,
    pub indexed: usize,
    pub skipped: usize,
    pub deleted: usize,
    pub errors: usize,
    pub records: usize,
    pub duration_ms: u128,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ChangedFilesResult {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub deleted: Vec<String>,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct RoleSummary {
    pub role: String,
    pub routes: i64,
    pub methods: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct Overview {
    pub repo_root: String,
    pub files: i64,
    pub permissions: i64,
    pub roles: i64,
    pub public_routes: i64,
    pub last_indexed: Option<i64>,
}
