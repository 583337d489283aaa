use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    All,
}

impl HttpMethod {
    pub const ALL_METHODS: [HttpMethod; 7] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Delete,
        HttpMethod::Patch,
        HttpMethod::Options,
        HttpMethod::All,
    ];

    /// Maps an Express router member name (`get`, `post`, ...) to a method.
    /// Member names are case-sensitive.
    pub fn from_member(name: &str) -> Option<Self> {
        match name {
            "get" => Some(HttpMethod::Get),
            "post" => Some(HttpMethod::Post),
            "put" => Some(HttpMethod::Put),
            "delete" => Some(HttpMethod::Delete),
            "patch" => Some(HttpMethod::Patch),
            "options" => Some(HttpMethod::Options),
            "all" => Some(HttpMethod::All),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::All => "ALL",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        match HttpMethod::from_member(&trimmed.to_ascii_lowercase()) {
            Some(method) => Ok(method),
            None => bail!("unknown http method: {trimmed}"),
        }
    }
}

/// Prefixes a route path with a mount base.
///
/// Exactly one `/` separates the two parts when both are non-empty, and a
/// non-empty result always starts with `/`.
pub fn compose_path(base: &str, raw: &str) -> String {
    let joined = if base.is_empty() {
        raw.to_string()
    } else if raw.is_empty() {
        base.to_string()
    } else {
        match (base.ends_with('/'), raw.starts_with('/')) {
            (true, true) => format!("{}{raw}", base.trim_end_matches('/')),
            (false, false) => format!("{base}/{raw}"),
            _ => format!("{base}{raw}"),
        }
    };
    if joined.is_empty() || joined.starts_with('/') {
        joined
    } else {
        format!("/{joined}")
    }
}
