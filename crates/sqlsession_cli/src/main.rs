//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `sqlsession_core` linkage.
//! - Validate a configuration file against a database with `check`.

use log::error;
use sqlsession_core::rusqlite::types::Value;
use sqlsession_core::{
    init_logging, lock_session, CallScope, Config, DataSource, MappingCatalog, PersistError,
    PersistenceSession, RequestLifecycle, StatelessSessionManager, WorkContext,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

const USAGE: &str = "usage: sqlsession_cli [check <config.json> <database>]";

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [] => {
            println!("sqlsession_core ping={}", sqlsession_core::ping());
            println!("sqlsession_core version={}", sqlsession_core::core_version());
            ExitCode::SUCCESS
        }
        [command, config, database] if command == "check" => {
            match check(config, PathBuf::from(database)) {
                Ok(tables) => {
                    for table in tables {
                        println!("table={table}");
                    }
                    ExitCode::SUCCESS
                }
                Err(message) => {
                    error!("event=cli_check module=cli status=error error={message}");
                    eprintln!("check failed: {message}");
                    ExitCode::FAILURE
                }
            }
        }
        _ => {
            eprintln!("{USAGE}");
            ExitCode::from(2)
        }
    }
}

/// Loads the configuration and lists tables inside one unit of work.
fn check(config_path: &str, database: PathBuf) -> Result<Vec<String>, String> {
    let config = Config::from_file(config_path).map_err(|err| err.to_string())?;
    if let Some(logging) = &config.logging {
        init_logging(logging)?;
    }
    println!(
        "catalog={} scope={}",
        config.fluent_mapping_assembly_name,
        config.transaction_scope.as_str()
    );

    let catalog = MappingCatalog::new(config.fluent_mapping_assembly_name.clone());
    let manager = StatelessSessionManager::init(config, DataSource::File(database), [catalog])
        .map(Arc::new)
        .map_err(|err| err.to_string())?;
    let lifecycle = RequestLifecycle::new(Arc::clone(&manager));

    let scope = CallScope::begin();
    let rows = lifecycle.run(WorkContext::call(&scope), |ctx| {
        let shared = manager.get_session(&ctx)?;
        let mut session = lock_session(&shared);
        session.query_values(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
            &[],
        )
    });
    manager.shutdown();

    Ok(rows
        .map_err(|err: PersistError| err.to_string())?
        .into_iter()
        .filter_map(|row| match row.into_iter().next() {
            Some(Value::Text(name)) => Some(name),
            _ => None,
        })
        .collect())
}
