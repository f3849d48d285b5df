// src/main.rs

mod db;
mod error;
mod export;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use db::session::FoxProSession;
use export::exporter::export_tables;

const DATABASE_EXTENSION: &str = "dbc";

#[derive(Parser, Debug)]
#[command(
    name = "foxpro-extractor",
    version,
    about = "Exports every table of a Visual FoxPro database to pipe-delimited CSV files"
)]
struct Args {
    /// Path to the FoxPro database container (.dbc) file
    database: PathBuf,

    /// Target directory for the per-table CSV files
    target_dir: PathBuf,

    /// Delete a pre-existing target directory without asking
    #[arg(long)]
    yes: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    if let Err(message) = check_arguments(&args) {
        eprintln!("{message}");
        print_usage();
        return ExitCode::FAILURE;
    }

    if let Err(message) = prepare_target_dir(&args) {
        eprintln!("{message}");
        print_usage();
        return ExitCode::FAILURE;
    }

    match run(&args) {
        Ok(()) => {
            info!("finished");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    let session = FoxProSession::open(&args.database)?;
    export_tables(&session, &args.target_dir)?;
    Ok(())
}

/// Validates the database path: it must carry the expected extension and
/// point at an existing file.
fn check_arguments(args: &Args) -> Result<(), String> {
    let extension = args
        .database
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");

    if extension != DATABASE_EXTENSION {
        return Err(format!(
            "Unexpected file extension '{extension}'. It should be '{DATABASE_EXTENSION}'."
        ));
    }

    if !args.database.is_file() {
        return Err(format!(
            "Database path does not exist: {}",
            args.database.display()
        ));
    }

    Ok(())
}

/// A pre-existing target directory is only deleted with explicit consent,
/// either via `--yes` or an interactive confirmation.
fn prepare_target_dir(args: &Args) -> Result<(), String> {
    if !args.target_dir.exists() {
        return Ok(());
    }

    if !args.yes && !confirm_deletion(&args.target_dir.display().to_string()) {
        return Err(format!(
            "Target directory already exists: {}",
            args.target_dir.display()
        ));
    }

    info!(dir = %args.target_dir.display(), "deleting target directory");
    std::fs::remove_dir_all(&args.target_dir).map_err(|e| {
        format!(
            "Cannot delete target directory {}: {e}",
            args.target_dir.display()
        )
    })
}

fn confirm_deletion(target_dir: &str) -> bool {
    print!("Target directory '{target_dir}' already exists. Delete and recreate it? [y/N]: ");
    let _ = io::stdout().flush();

    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    answer.trim().eq_ignore_ascii_case("y")
}

fn print_usage() {
    eprintln!("Usage: foxpro-extractor <database.{DATABASE_EXTENSION}> <target_dir>");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(database: PathBuf, target_dir: PathBuf) -> Args {
        Args {
            database,
            target_dir,
            yes: false,
        }
    }

    #[test]
    fn test_wrong_extension_is_rejected() {
        let err = check_arguments(&args(PathBuf::from("data.mdb"), PathBuf::from("out")))
            .unwrap_err();
        assert!(err.contains("'mdb'"), "{err}");
    }

    #[test]
    fn test_missing_extension_is_rejected() {
        let err =
            check_arguments(&args(PathBuf::from("data"), PathBuf::from("out"))).unwrap_err();
        assert!(err.contains("''"), "{err}");
    }

    #[test]
    fn test_missing_database_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let database = dir.path().join("missing.dbc");
        let err = check_arguments(&args(database, PathBuf::from("out"))).unwrap_err();
        assert!(err.contains("does not exist"), "{err}");
    }

    #[test]
    fn test_existing_database_file_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let database = dir.path().join("legacy.dbc");
        std::fs::write(&database, b"").unwrap();
        assert!(check_arguments(&args(database, PathBuf::from("out"))).is_ok());
    }

    #[test]
    fn test_fresh_target_dir_needs_no_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        let database = dir.path().join("legacy.dbc");
        std::fs::write(&database, b"").unwrap();
        let target = dir.path().join("fresh");
        assert!(prepare_target_dir(&args(database, target)).is_ok());
    }

    #[test]
    fn test_existing_target_dir_is_deleted_with_yes() {
        let dir = tempfile::tempdir().unwrap();
        let database = dir.path().join("legacy.dbc");
        std::fs::write(&database, b"").unwrap();
        let target = dir.path().join("out");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("stale.csv"), b"old").unwrap();

        let mut args = args(database, target.clone());
        args.yes = true;
        prepare_target_dir(&args).unwrap();
        assert!(!target.exists());
    }
}
