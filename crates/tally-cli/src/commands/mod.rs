mod init;
mod instruments;
mod reprocess;
mod scrape;
mod update;

use std::path::Path;

use tally_core::{Warehouse, WarehouseConfig};

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub async fn run(cli: Cli) -> Result<(), CliError> {
    let warehouse = open_warehouse(cli.db.as_deref())?;

    match cli.command {
        Command::Init => init::run(&warehouse),
        Command::Scrape {
            input,
            concurrency,
            max_in_flight,
            requests_per_minute,
        } => scrape::run(warehouse, &input, concurrency, max_in_flight, requests_per_minute).await,
        Command::LoadInstruments { input } => instruments::run(&warehouse, &input),
        Command::Update { freq, failure_log } => {
            update::run(&warehouse, freq.into(), &failure_log).await
        }
        Command::Reprocess { failure_log } => reprocess::run(&warehouse, &failure_log).await,
    }
}

fn open_warehouse(db: Option<&Path>) -> Result<Warehouse, CliError> {
    let warehouse = match db {
        Some(path) => Warehouse::open(WarehouseConfig {
            db_path: path.to_owned(),
            ..WarehouseConfig::default()
        })?,
        None => Warehouse::open_default()?,
    };
    Ok(warehouse)
}
