use crate::export::ExportFormat;
use crate::indexer::http::HttpMethod;
use crate::indexer::{ExtractOptions, ReceiverPolicy};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "authgraph",
    version,
    about = "Static route to role extraction for Express applications",
    after_help = r#"Examples:
  authgraph extract src/app.js
  cat routes.js | authgraph extract - --guard checkRole,requireRole
  authgraph scan --repo . --format csv --out permissions.csv
  authgraph index --repo .
  authgraph routes --role admin --method delete
  authgraph export --format cypher --out graph.cypher
"#
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Extract permissions from a single file (`-` reads stdin).
    Extract {
        file: PathBuf,
        /// Name reported for stdin input.
        #[arg(long, default_value = "<stdin>")]
        stdin_name: String,
        #[arg(long, value_enum, default_value = "json")]
        format: ExportFormat,
        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Extract permissions from every file in a repository without a store.
    Scan {
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        /// Include files ignored by .gitignore.
        #[arg(long)]
        no_ignore: bool,
        #[arg(long, value_enum, default_value = "json")]
        format: ExportFormat,
        /// Write output to a file instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Index repository into the store, skipping unchanged files.
    Index {
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        #[arg(long)]
        db: Option<PathBuf>,
        /// Include files ignored by .gitignore.
        #[arg(long)]
        no_ignore: bool,
        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Show changed files compared to store state.
    ChangedFiles {
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        #[arg(long)]
        db: Option<PathBuf>,
        /// Include files ignored by .gitignore.
        #[arg(long)]
        no_ignore: bool,
    },
    /// Query stored permissions.
    Routes {
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        #[arg(long)]
        db: Option<PathBuf>,
        /// Only routes requiring this role.
        #[arg(long)]
        role: Option<String>,
        /// Only routes with this HTTP method.
        #[arg(long)]
        method: Option<HttpMethod>,
        /// Only routes whose path starts with this prefix.
        #[arg(long)]
        path_prefix: Option<String>,
        /// Only routes declared in this file (repo-relative).
        #[arg(long)]
        file: Option<String>,
        /// Only routes without any role requirement.
        #[arg(long)]
        public: bool,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, value_enum, default_value = "json")]
        format: ExportFormat,
    },
    /// Summarize stored permissions per role.
    Roles {
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Print a store overview.
    Overview {
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Export every stored permission.
    Export {
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        #[arg(long)]
        db: Option<PathBuf>,
        #[arg(long, value_enum, default_value = "graph")]
        format: ExportFormat,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(clap::Args, Clone, Debug)]
pub struct EngineArgs {
    /// Identifier treated as the application when none is declared.
    #[arg(long, default_value = "app")]
    pub default_app: String,
    /// Role guard function names (repeatable or comma separated).
    #[arg(long = "guard", value_delimiter = ',', default_value = "checkRole")]
    pub guards: Vec<String>,
    /// Drop routes registered on undeclared receivers.
    #[arg(long)]
    pub strict_receivers: bool,
}

impl EngineArgs {
    pub fn extract_options(&self) -> ExtractOptions {
        let role_guards = self
            .guards
            .iter()
            .map(|guard| guard.trim().to_string())
            .filter(|guard| !guard.is_empty())
            .collect();
        ExtractOptions {
            default_app: self.default_app.clone(),
            role_guards,
            receivers: if self.strict_receivers {
                ReceiverPolicy::Strict
            } else {
                ReceiverPolicy::Permissive
            },
            ..ExtractOptions::default()
        }
    }
}
