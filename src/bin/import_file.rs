// Command-line import: parse a CSV/Excel file, validate it against a target schema and commit it.
//
// Usage:
//   cargo run --bin import_file -- <target> <file> [db_path] [--dry-run] [--keep-duplicates]
//
// Defaults come from config_kv (see config::config_keys); flags override them for this run.

use anyhow::{bail, Context};
use data_import_engine::config::{ConfigManager, ImportConfigReader};
use data_import_engine::domain::ImportOutcome;
use data_import_engine::importer::{FileParser, ImportSession, UniversalFileParser};
use data_import_engine::logging;
use data_import_engine::repository::SqliteImportRepository;
use std::path::Path;

const USAGE: &str = "usage: import_file <target> <file> [db_path] [--dry-run] [--keep-duplicates]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let mut positional = Vec::new();
    let mut dry_run = false;
    let mut keep_duplicates = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--dry-run" => dry_run = true,
            "--keep-duplicates" => keep_duplicates = true,
            flag if flag.starts_with("--") => bail!("unknown flag {}\n{}", flag, USAGE),
            _ => positional.push(arg),
        }
    }

    let (target, file) = match (positional.first(), positional.get(1)) {
        (Some(target), Some(file)) => (target.clone(), file.clone()),
        _ => bail!(USAGE),
    };
    let db_path = positional
        .get(2)
        .cloned()
        .unwrap_or_else(|| "data_import.db".to_string());

    let config = ConfigManager::new(&db_path)?;
    let registry = config.load_schema_registry()?;
    let settings = config.load_settings().await?;
    let repo = SqliteImportRepository::new(&db_path)?;

    let mut session = ImportSession::new(&registry, &target, settings)?;
    if dry_run {
        session.set_dry_run(true)?;
    }

    let parsed = UniversalFileParser
        .parse_file(Path::new(&file))
        .with_context(|| format!("cannot read {}", file))?;
    session.load_file(parsed)?;

    for contested in session.contested_headers() {
        println!(
            "column '{}' matches {:?}; mapped to {}",
            contested.header,
            contested.candidates,
            contested.claimed_by.as_deref().unwrap_or("-")
        );
    }

    let existing = repo.existing_key_set(session.target())?;
    session.validate(&existing)?;
    if keep_duplicates {
        session.set_skip_duplicates(false)?;
    }

    let skip = session.skip_duplicates();
    for row in session.parsed_rows() {
        for issue in &row.errors {
            println!("row {}: {}: {}", row.ordinal, issue.field, issue.message);
        }
        for issue in &row.warnings {
            let action = if skip { "skipped" } else { "will import" };
            println!("row {}: {} ({})", row.ordinal, issue.message, action);
        }
    }

    let stats = session.stats();
    println!(
        "total={} valid={} errors={} warnings={} duplicates={} skipped={}",
        stats.total, stats.valid, stats.errors, stats.warnings, stats.duplicates, stats.skipped
    );

    session.proceed_to_import()?;
    session.commit(&repo, settings.commit_timeout()).await?;

    match session.outcome() {
        ImportOutcome::Complete { imported } if session.dry_run() => {
            println!("dry run complete: {} rows would be imported, {} written", stats.valid, imported)
        }
        ImportOutcome::Complete { imported } => println!("imported={}", imported),
        other => bail!("import did not complete: {:?}", other),
    }

    println!("session_id={}", session.session_id());
    Ok(())
}
