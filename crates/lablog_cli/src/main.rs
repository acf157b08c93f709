//! CLI smoke entry point.
//!
//! # Responsibility
//! - Open (and migrate) a lab log database and report its shape.
//! - Keep output deterministic for quick local sanity checks.
//!
//! Usage: `lablog_cli [DB_PATH]`. Without a path an in-memory database is
//! used. Set `LABLOG_LOG_DIR` to an absolute directory to enable file logs.

use lablog_core::{init_logging, LogSettings, SqliteLabStore};
use log::info;
use std::process::ExitCode;

fn main() -> ExitCode {
    if let Some(log_dir) = std::env::var_os("LABLOG_LOG_DIR") {
        if let Err(err) = init_logging(&LogSettings::new(log_dir)) {
            eprintln!("logging disabled: {err}");
        }
    }

    match run(std::env::args().nth(1)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("lablog_cli error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(db_path: Option<String>) -> Result<(), lablog_core::RepoError> {
    let store = match db_path.as_deref() {
        Some(path) => SqliteLabStore::open(path)?,
        None => SqliteLabStore::open_in_memory()?,
    };
    info!("event=cli_report module=cli status=start");

    println!("lablog_core version={}", lablog_core::core_version());
    println!("schema_version={}", store.schema_version()?);
    for (table, rows) in store.table_counts()? {
        println!("table={table} rows={rows}");
    }
    Ok(())
}
