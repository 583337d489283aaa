use anyhow::{Context, Result};
use authgraph::cli;
use authgraph::db::{Db, PermissionQuery};
use authgraph::export;
use authgraph::indexer::{self, scan::ScanOptions};
use authgraph::model::SourceUnit;
use clap::Parser;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn default_db_path(repo: &Path) -> PathBuf {
    repo.join(indexer::scan::STORE_DIR).join("authgraph.sqlite")
}

fn open_db(repo: &Path, db: Option<PathBuf>) -> Result<Db> {
    let db_path = db.unwrap_or_else(|| default_db_path(repo));
    Db::new(&db_path)
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "authgraph=info".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let args = cli::Args::parse();

    match args.command {
        cli::Command::Extract {
            file,
            stdin_name,
            format,
            engine,
        } => {
            let (name, text) = if file.as_os_str() == "-" {
                let mut text = String::new();
                std::io::stdin()
                    .read_to_string(&mut text)
                    .with_context(|| "read stdin")?;
                (stdin_name, text)
            } else {
                let text = authgraph::util::read_to_string(&file)?;
                (authgraph::util::normalize_path(&file), text)
            };
            let records =
                indexer::extract_permissions(&SourceUnit::new(&name, &text), &engine.extract_options());
            export::write_output(&export::render(&records, format)?, None)
        }
        cli::Command::Scan {
            repo,
            no_ignore,
            format,
            out,
            engine,
        } => {
            let analysis = indexer::analyze(
                &repo,
                ScanOptions::new(no_ignore),
                &engine.extract_options(),
            )?;
            export::write_output(
                &export::render(&analysis.records, format)?,
                out.as_deref(),
            )
        }
        cli::Command::Index {
            repo,
            db,
            no_ignore,
            engine,
        } => {
            let db_path = db.unwrap_or_else(|| default_db_path(&repo));
            let indexer = indexer::Indexer::new_with_options(
                repo,
                db_path,
                ScanOptions::new(no_ignore),
                engine.extract_options(),
            )?;
            let stats = indexer.reindex()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
        cli::Command::ChangedFiles {
            repo,
            db,
            no_ignore,
        } => {
            let db_path = db.unwrap_or_else(|| default_db_path(&repo));
            let indexer = indexer::Indexer::new_with_options(
                repo,
                db_path,
                ScanOptions::new(no_ignore),
                indexer::ExtractOptions::default(),
            )?;
            let changed = indexer.changed_files()?;
            println!("{}", serde_json::to_string_pretty(&changed)?);
            Ok(())
        }
        cli::Command::Routes {
            repo,
            db,
            role,
            method,
            path_prefix,
            file,
            public,
            limit,
            format,
        } => {
            let db = open_db(&repo, db)?;
            let records = db.query_permissions(&PermissionQuery {
                role,
                method,
                path_prefix,
                file,
                public_only: public,
                limit,
            })?;
            export::write_output(&export::render(&records, format)?, None)
        }
        cli::Command::Roles { repo, db } => {
            let db = open_db(&repo, db)?;
            println!("{}", serde_json::to_string_pretty(&db.role_summary()?)?);
            Ok(())
        }
        cli::Command::Overview { repo, db } => {
            let db = open_db(&repo, db)?;
            let repo_root = std::fs::canonicalize(&repo).unwrap_or(repo);
            println!("{}", serde_json::to_string_pretty(&db.overview(&repo_root)?)?);
            Ok(())
        }
        cli::Command::Export {
            repo,
            db,
            format,
            out,
        } => {
            let db = open_db(&repo, db)?;
            let records = db.all_permissions()?;
            if records.is_empty() {
                tracing::warn!("store holds no permissions, run `authgraph index` first");
            }
            export::write_output(&export::render(&records, format)?, out.as_deref())
        }
    }
}
